//! Core data model: label sets, exemplars and label matchers
//!
//! A series is identified by its canonical (name-sorted) label set. Exemplars
//! carry their own, independent label set plus a millisecond timestamp and a
//! value.

mod exemplar;
mod labels;
mod matcher;

pub use exemplar::{Exemplar, QueryResult};
pub use labels::{Label, Labels, METRIC_NAME_LABEL};
pub use matcher::{MatchType, Matcher};
