//! Series grouping
//!
//! Collects decoded rows into one [`QueryResult`] per series, keyed by the
//! hash of the canonical series label set. Results keep first-arrival order
//! and exemplars keep arrival order within a series.
//!
//! Rows from several scans are merged as a multiset union: a stored row that
//! two selector groups both return is kept once, while identical rows stored
//! more than once keep their multiplicity.

use crate::model::{Exemplar, Labels, QueryResult};
use std::collections::HashMap;

/// Identity of one returned row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RowKey {
    series: u64,
    labels: u64,
    timestamp: i64,
    value: u64,
}

impl RowKey {
    fn new(series: u64, exemplar: &Exemplar) -> Self {
        Self {
            series,
            labels: exemplar.labels.hash_key(),
            timestamp: exemplar.timestamp,
            value: exemplar.value.to_bits(),
        }
    }
}

/// Accumulates rows across scans.
///
/// A row that several selector groups return is not appended once per group:
/// the merge keeps it once, so overlapping selectors never duplicate an
/// exemplar.
#[derive(Debug, Default)]
pub struct SeriesGrouper {
    index: HashMap<u64, usize>,
    results: Vec<QueryResult>,
    kept: HashMap<RowKey, usize>,
    in_scan: HashMap<RowKey, usize>,
}

impl SeriesGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of another scan's rows
    pub fn start_scan(&mut self) {
        self.in_scan.clear();
    }

    pub fn push(&mut self, series: Labels, exemplar: Exemplar) {
        let key = series.hash_key();

        let row = RowKey::new(key, &exemplar);
        let seen = self.in_scan.entry(row).or_insert(0);
        *seen += 1;
        let kept = self.kept.entry(row).or_insert(0);
        if *seen <= *kept {
            return;
        }
        *kept += 1;

        match self.index.get(&key) {
            Some(&slot) => self.results[slot].exemplars.push(exemplar),
            None => {
                self.index.insert(key, self.results.len());
                self.results.push(QueryResult {
                    series_labels: series,
                    exemplars: vec![exemplar],
                });
            }
        }
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = (Labels, Exemplar)>) {
        for (series, exemplar) in rows {
            self.push(series, exemplar);
        }
    }

    pub fn series_count(&self) -> usize {
        self.results.len()
    }

    pub fn exemplar_count(&self) -> usize {
        self.results.iter().map(|r| r.exemplars.len()).sum()
    }

    pub fn finish(self) -> Vec<QueryResult> {
        self.results
    }
}

/// Group the rows of a single scan
pub fn group(rows: impl IntoIterator<Item = (Labels, Exemplar)>) -> Vec<QueryResult> {
    let mut grouper = SeriesGrouper::new();
    grouper.extend(rows);
    grouper.finish()
}
