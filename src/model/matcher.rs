//! Label matchers

use std::fmt;
use std::str::FromStr;

/// Comparison applied by a [`Matcher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `=~`
    RegexMatch,
    /// `!~`
    RegexNotMatch,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Equal => "=",
            MatchType::NotEqual => "!=",
            MatchType::RegexMatch => "=~",
            MatchType::RegexNotMatch => "!~",
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, MatchType::RegexMatch | MatchType::RegexNotMatch)
    }
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "=" => Ok(MatchType::Equal),
            "!=" => Ok(MatchType::NotEqual),
            "=~" => Ok(MatchType::RegexMatch),
            "!~" => Ok(MatchType::RegexNotMatch),
            other => Err(format!(
                "unknown match operator '{}'; expected one of =, !=, =~, !~",
                other
            )),
        }
    }
}

/// Predicate over one series label
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Matcher {
    pub kind: MatchType,
    pub name: String,
    pub value: String,
}

impl Matcher {
    pub fn new(kind: MatchType, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(MatchType::Equal, name, value)
    }

    pub fn not_equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(MatchType::NotEqual, name, value)
    }

    pub fn regex(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(MatchType::RegexMatch, name, value)
    }

    pub fn not_regex(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(MatchType::RegexNotMatch, name, value)
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.kind.as_str(), self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_type_round_trips_through_operator() {
        for kind in [
            MatchType::Equal,
            MatchType::NotEqual,
            MatchType::RegexMatch,
            MatchType::RegexNotMatch,
        ] {
            assert_eq!(kind.as_str().parse::<MatchType>().unwrap(), kind);
        }
        assert!("==".parse::<MatchType>().is_err());
    }

    #[test]
    fn test_matcher_display() {
        assert_eq!(Matcher::regex("job", "a.*").to_string(), r#"job=~"a.*""#);
    }
}
