//! Exemplars and per-series query results

use super::Labels;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// A single labeled sample attached to a parent series
#[derive(Debug, Clone, PartialEq)]
pub struct Exemplar {
    /// Exemplar labels, independent of the series labels
    pub labels: Labels,
    /// Timestamp in milliseconds since epoch
    pub timestamp: i64,
    pub value: f64,
}

impl Exemplar {
    pub fn new(labels: Labels, timestamp: i64, value: f64) -> Self {
        Self {
            labels,
            timestamp,
            value,
        }
    }
}

/// Serialized the way the Prometheus exemplars API does: the value as a
/// string and the timestamp as fractional seconds.
impl Serialize for Exemplar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Exemplar", 3)?;
        state.serialize_field("labels", &self.labels)?;
        state.serialize_field("value", &format_sample_value(self.value))?;
        state.serialize_field("timestamp", &(self.timestamp as f64 / 1000.0))?;
        state.end()
    }
}

fn format_sample_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

/// All exemplars found for one series
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct QueryResult {
    #[serde(rename = "seriesLabels")]
    pub series_labels: Labels,
    pub exemplars: Vec<Exemplar>,
}
