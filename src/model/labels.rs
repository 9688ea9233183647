//! Canonical label sets

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use xxhash_rust::xxh64::Xxh64;

/// Reserved label holding the metric name
pub const METRIC_NAME_LABEL: &str = "__name__";

const SEPARATOR: [u8; 1] = [0xff];

/// A single name/value pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Label set kept in canonical order (sorted by name).
///
/// Two label sets describe the same series iff their sorted name/value
/// sequences are identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Labels(Vec<Label>);

impl Labels {
    /// Build a label set, sorting it into canonical order
    pub fn new(mut labels: Vec<Label>) -> Self {
        labels.sort();
        Self(labels)
    }

    /// Empty label set
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a label set from `(name, value)` pairs
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, value)| Label::new(name, value))
                .collect(),
        )
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Label> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of the named label, if present
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|label| label.name == name)
            .map(|label| label.value.as_str())
    }

    /// Label names in canonical order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|label| label.name.as_str())
    }

    /// First label name that occurs more than once, if any
    pub fn duplicate_name(&self) -> Option<&str> {
        self.0
            .windows(2)
            .find(|pair| pair[0].name == pair[1].name)
            .map(|pair| pair[0].name.as_str())
    }

    /// Hash over the canonical order, used as a grouping key.
    ///
    /// Collisions between different label sets are not defended against.
    pub fn hash_key(&self) -> u64 {
        let mut hasher = Xxh64::new(0);
        for label in &self.0 {
            hasher.update(label.name.as_bytes());
            hasher.update(&SEPARATOR);
            hasher.update(label.value.as_bytes());
            hasher.update(&SEPARATOR);
        }
        hasher.digest()
    }

    pub fn into_vec(self) -> Vec<Label> {
        self.0
    }
}

impl FromIterator<Label> for Labels {
    fn from_iter<I: IntoIterator<Item = Label>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Labels {
    type Item = &'a Label;
    type IntoIter = std::slice::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={:?}", label.name, label.value)?;
        }
        f.write_str("}")
    }
}

/// Serialized as a JSON object `{name: value}`, the shape of the
/// Prometheus HTTP API.
impl Serialize for Labels {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for label in &self.0 {
            map.serialize_entry(&label.name, &label.value)?;
        }
        map.end()
    }
}
