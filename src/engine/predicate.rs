//! Filter predicates understood by the columnar engine
//!
//! A small expression tree over physical column names. Engines lower it to
//! their own expression language; [`Predicate::to_expr`] produces the
//! DataFusion form.

use datafusion::logical_expr::{binary_expr, Operator};
use datafusion::prelude::*;
use std::collections::BTreeSet;

/// A predicate on column values
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Equality: column = value
    Eq(String, PredicateValue),
    /// Not equal: column != value
    NotEq(String, PredicateValue),
    /// Less than: column < value
    Lt(String, PredicateValue),
    /// Greater than: column > value
    Gt(String, PredicateValue),
    /// Regular expression match on a string column
    RegexMatch(String, String),
    /// Negated regular expression match on a string column
    RegexNotMatch(String, String),
    /// Logical AND
    And(Box<Predicate>, Box<Predicate>),
}

/// Literal operand of a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateValue {
    String(String),
    Int64(i64),
    Float64(f64),
}

impl From<&str> for PredicateValue {
    fn from(value: &str) -> Self {
        PredicateValue::String(value.to_string())
    }
}

impl From<String> for PredicateValue {
    fn from(value: String) -> Self {
        PredicateValue::String(value)
    }
}

impl From<i64> for PredicateValue {
    fn from(value: i64) -> Self {
        PredicateValue::Int64(value)
    }
}

impl From<f64> for PredicateValue {
    fn from(value: f64) -> Self {
        PredicateValue::Float64(value)
    }
}

impl Predicate {
    /// `self AND other`
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// Left-deep conjunction of all predicates, `None` when empty
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Option<Predicate> {
        predicates.into_iter().reduce(Predicate::and)
    }

    /// Physical column names referenced anywhere in the tree
    pub fn columns(&self) -> BTreeSet<&str> {
        let mut columns = BTreeSet::new();
        self.collect_columns(&mut columns);
        columns
    }

    fn collect_columns<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Predicate::Eq(col, _)
            | Predicate::NotEq(col, _)
            | Predicate::Lt(col, _)
            | Predicate::Gt(col, _)
            | Predicate::RegexMatch(col, _)
            | Predicate::RegexNotMatch(col, _) => {
                out.insert(col.as_str());
            }
            Predicate::And(left, right) => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
        }
    }

    /// Lower to a DataFusion expression.
    ///
    /// String comparisons read a null cell as the empty string, so an absent
    /// label compares equal to `""`.
    pub fn to_expr(&self) -> Expr {
        match self {
            Predicate::Eq(col, val) => operand(col, val).eq(literal(val)),
            Predicate::NotEq(col, val) => operand(col, val).not_eq(literal(val)),
            Predicate::Lt(col, val) => operand(col, val).lt(literal(val)),
            Predicate::Gt(col, val) => operand(col, val).gt(literal(val)),
            Predicate::RegexMatch(col, pattern) => {
                binary_expr(string_operand(col), Operator::RegexMatch, lit(pattern.as_str()))
            }
            Predicate::RegexNotMatch(col, pattern) => binary_expr(
                string_operand(col),
                Operator::RegexNotMatch,
                lit(pattern.as_str()),
            ),
            Predicate::And(left, right) => left.to_expr().and(right.to_expr()),
        }
    }
}

// `ident` keeps dotted dynamic column names unqualified.
fn operand(col: &str, val: &PredicateValue) -> Expr {
    match val {
        PredicateValue::String(_) => string_operand(col),
        PredicateValue::Int64(_) | PredicateValue::Float64(_) => ident(col),
    }
}

fn string_operand(col: &str) -> Expr {
    coalesce(vec![cast(ident(col), arrow_schema::DataType::Utf8), lit("")])
}

fn literal(val: &PredicateValue) -> Expr {
    match val {
        PredicateValue::String(s) => lit(s.as_str()),
        PredicateValue::Int64(i) => lit(*i),
        PredicateValue::Float64(f) => lit(*f),
    }
}
