//! Matcher translation
//!
//! Turns one selector group into a filter over the series-label sub-columns,
//! ANDed with an exclusive time range.

use crate::engine::Predicate;
use crate::model::{MatchType, Matcher};
use crate::schema::{physical_column_name, validate_label_name, COLUMN_LABELS, COLUMN_TIMESTAMP};
use crate::{Error, Result};

use regex::Regex;

/// Translate a selector group into a scan filter.
///
/// Returns `None` for an empty group: nothing is scanned for it.
pub fn translate(matchers: &[Matcher], start: i64, end: i64) -> Result<Option<Predicate>> {
    if matchers.is_empty() {
        return Ok(None);
    }

    let mut predicates = Vec::with_capacity(matchers.len() + 2);
    for matcher in matchers {
        predicates.push(translate_matcher(matcher)?);
    }
    predicates.push(Predicate::Gt(COLUMN_TIMESTAMP.to_string(), start.into()));
    predicates.push(Predicate::Lt(COLUMN_TIMESTAMP.to_string(), end.into()));

    Ok(Predicate::all(predicates))
}

fn translate_matcher(matcher: &Matcher) -> Result<Predicate> {
    validate_label_name(&matcher.name).map_err(|_| {
        Error::QueryTranslation(format!("invalid label name in matcher {}", matcher))
    })?;
    let column = physical_column_name(COLUMN_LABELS, &matcher.name);

    let predicate = match matcher.kind {
        MatchType::Equal => Predicate::Eq(column, matcher.value.as_str().into()),
        MatchType::NotEqual => Predicate::NotEq(column, matcher.value.as_str().into()),
        MatchType::RegexMatch => Predicate::RegexMatch(column, anchored(matcher)?),
        MatchType::RegexNotMatch => Predicate::RegexNotMatch(column, anchored(matcher)?),
    };
    Ok(predicate)
}

/// Label regexes match the whole value
fn anchored(matcher: &Matcher) -> Result<String> {
    let pattern = format!("^(?:{})$", matcher.value);
    Regex::new(&pattern).map_err(|e| {
        Error::QueryTranslation(format!("invalid regex in matcher {}: {}", matcher, e))
    })?;
    Ok(pattern)
}
