//! Vector selector extraction
//!
//! Pulls the label matchers of every vector selector out of a PromQL-style
//! query expression, one matcher group per selector. Only selectors are
//! interpreted; functions, aggregations, operators, grouping clauses, range
//! brackets and literals are skipped.

use crate::model::{MatchType, Matcher, METRIC_NAME_LABEL};
use crate::{Error, Result};

use regex::Regex;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Number,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Op(&'static str),
}

/// Words that never start a vector selector
const KEYWORDS: &[&str] = &[
    "and", "or", "unless", "bool", "offset", "inf", "nan", "by", "without", "on", "ignoring",
    "group_left", "group_right",
];

/// Clauses whose parenthesised label list is not a selector
const GROUPING: &[&str] = &["by", "without", "on", "ignoring", "group_left", "group_right"];

/// Extract one matcher group per vector selector in `expr`.
///
/// A metric name becomes an `__name__` equality matcher. Fails with
/// [`Error::BadData`] on a selector whose matchers all accept the empty
/// value (`{}`, `{job=""}`, `{job!="a"}`), an unterminated string or an
/// unknown matcher operator.
pub fn extract_selectors(expr: &str) -> Result<Vec<Vec<Matcher>>> {
    let tokens = tokenize(expr)?;
    let mut selectors = Vec::new();
    let mut pos = 0;

    while pos < tokens.len() {
        match &tokens[pos] {
            Token::Ident(word) => {
                let lower = word.to_ascii_lowercase();
                let next = tokens.get(pos + 1);
                if GROUPING.contains(&lower.as_str()) && next == Some(&Token::LParen) {
                    pos = skip_group(&tokens, pos + 1, &Token::LParen, &Token::RParen)?;
                } else if KEYWORDS.contains(&lower.as_str())
                    || next == Some(&Token::LParen)
                    || is_grouping_clause(next)
                {
                    pos += 1;
                } else {
                    let mut matchers = vec![Matcher::equal(METRIC_NAME_LABEL, word.as_str())];
                    pos += 1;
                    if tokens.get(pos) == Some(&Token::LBrace) {
                        let (inner, end) = parse_matchers(&tokens, pos + 1)?;
                        matchers.extend(inner);
                        pos = end;
                    }
                    selectors.push(matchers);
                }
            }
            Token::LBrace => {
                let (matchers, end) = parse_matchers(&tokens, pos + 1)?;
                if matches_everything(&matchers)? {
                    return Err(Error::BadData(
                        "vector selector must contain at least one non-empty matcher".to_string(),
                    ));
                }
                selectors.push(matchers);
                pos = end;
            }
            Token::LBracket => {
                pos = skip_group(&tokens, pos, &Token::LBracket, &Token::RBracket)?;
            }
            _ => pos += 1,
        }
    }

    Ok(selectors)
}

/// True when every matcher accepts an absent label, so the selector would
/// select every series
fn matches_everything(matchers: &[Matcher]) -> Result<bool> {
    for matcher in matchers {
        if !matches_empty(matcher)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_empty(matcher: &Matcher) -> Result<bool> {
    let matched = match matcher.kind {
        MatchType::Equal => matcher.value.is_empty(),
        MatchType::NotEqual => !matcher.value.is_empty(),
        MatchType::RegexMatch | MatchType::RegexNotMatch => {
            let re = Regex::new(&format!("^(?:{})$", matcher.value)).map_err(|e| {
                Error::BadData(format!("invalid regular expression in {}: {}", matcher, e))
            })?;
            re.is_match("") == (matcher.kind == MatchType::RegexMatch)
        }
    };
    Ok(matched)
}

/// `sum by (..) (..)`: an aggregation followed by its clause
fn is_grouping_clause(token: Option<&Token>) -> bool {
    matches!(token, Some(Token::Ident(word)) if GROUPING.contains(&word.to_ascii_lowercase().as_str()))
}

/// Skip a balanced `open ... close` run starting at `pos`
fn skip_group(tokens: &[Token], pos: usize, open: &Token, close: &Token) -> Result<usize> {
    let mut depth = 0usize;
    for (offset, token) in tokens[pos..].iter().enumerate() {
        if token == open {
            depth += 1;
        } else if token == close {
            depth -= 1;
            if depth == 0 {
                return Ok(pos + offset + 1);
            }
        }
    }
    Err(Error::BadData("unclosed bracket in query".to_string()))
}

/// Parse `name op "value", ...}` starting just after `{`
fn parse_matchers(tokens: &[Token], mut pos: usize) -> Result<(Vec<Matcher>, usize)> {
    let mut matchers = Vec::new();
    loop {
        match tokens.get(pos) {
            Some(Token::RBrace) => return Ok((matchers, pos + 1)),
            Some(Token::Ident(name)) | Some(Token::Str(name)) => {
                let kind = match tokens.get(pos + 1) {
                    Some(Token::Op(op)) => op.parse::<MatchType>().map_err(Error::BadData)?,
                    other => {
                        return Err(Error::BadData(format!(
                            "unexpected {} in label matching, expected label matching operator",
                            describe(other)
                        )))
                    }
                };
                let value = match tokens.get(pos + 2) {
                    Some(Token::Str(value)) => value,
                    other => {
                        return Err(Error::BadData(format!(
                            "unexpected {} in label matching, expected string",
                            describe(other)
                        )))
                    }
                };
                matchers.push(Matcher::new(kind, name.as_str(), value.as_str()));
                pos += 3;
                match tokens.get(pos) {
                    Some(Token::Comma) => pos += 1,
                    Some(Token::RBrace) => {}
                    other => {
                        return Err(Error::BadData(format!(
                            "unexpected {} in label matching, expected \",\" or \"}}\"",
                            describe(other)
                        )))
                    }
                }
            }
            other => {
                return Err(Error::BadData(format!(
                    "unexpected {} in label matching, expected label name",
                    describe(other)
                )))
            }
        }
    }
}

fn describe(token: Option<&Token>) -> String {
    match token {
        None => "end of input".to_string(),
        Some(Token::Ident(word)) => format!("identifier {:?}", word),
        Some(Token::Str(value)) => format!("string {:?}", value),
        Some(Token::Number) => "number".to_string(),
        Some(Token::Op(op)) => format!("operator {:?}", op),
        Some(Token::LBrace) => "\"{\"".to_string(),
        Some(Token::RBrace) => "\"}\"".to_string(),
        Some(Token::LParen) => "\"(\"".to_string(),
        Some(Token::RParen) => "\")\"".to_string(),
        Some(Token::LBracket) => "\"[\"".to_string(),
        Some(Token::RBracket) => "\"]\"".to_string(),
        Some(Token::Comma) => "\",\"".to_string(),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '"' | '\'' | '`' => {
                let (value, end) = read_string(&chars, i)?;
                tokens.push(Token::Str(value));
                i = end;
            }
            '=' | '!' | '<' | '>' => {
                let next = chars.get(i + 1).copied();
                let op = match (c, next) {
                    ('=', Some('=')) => "==",
                    ('=', Some('~')) => "=~",
                    ('=', _) => "=",
                    ('!', Some('=')) => "!=",
                    ('!', Some('~')) => "!~",
                    ('<', Some('=')) => "<=",
                    ('>', Some('=')) => ">=",
                    ('<', _) => "<",
                    ('>', _) => ">",
                    _ => {
                        return Err(Error::BadData(format!(
                            "unexpected character after '!' at position {}",
                            i
                        )))
                    }
                };
                tokens.push(Token::Op(op));
                i += op.len();
            }
            '+' | '-' | '*' | '/' | '%' | '^' | '@' | ':' => {
                tokens.push(Token::Op(match c {
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    '/' => "/",
                    '%' => "%",
                    '^' => "^",
                    '@' => "@",
                    _ => ":",
                }));
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut prev = c;
                i += 1;
                while let Some(&next) = chars.get(i) {
                    let exponent_sign = (next == '+' || next == '-') && (prev == 'e' || prev == 'E');
                    if next.is_ascii_alphanumeric() || next == '.' || next == '_' || exponent_sign {
                        prev = next;
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == ':')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(Error::BadData(format!(
                    "unexpected character {:?} at position {}",
                    other, i
                )))
            }
        }
    }

    Ok(tokens)
}

/// Read a quoted string starting at the opening quote
fn read_string(chars: &[char], start: usize) -> Result<(String, usize)> {
    let quote = chars[start];
    let mut value = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            return Ok((value, i + 1));
        }
        if c == '\\' && quote != '`' {
            let escaped = chars
                .get(i + 1)
                .ok_or_else(|| Error::BadData("unterminated quoted string".to_string()))?;
            value.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '\\' => '\\',
                '"' => '"',
                '\'' => '\'',
                other => {
                    return Err(Error::BadData(format!(
                        "unknown escape sequence '\\{}'",
                        other
                    )))
                }
            });
            i += 2;
            continue;
        }
        if c == '\n' && quote != '`' {
            break;
        }
        value.push(c);
        i += 1;
    }

    Err(Error::BadData("unterminated quoted string".to_string()))
}
