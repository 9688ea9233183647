//! Columnar engine boundary
//!
//! The store never touches physical storage directly. It creates its table,
//! inserts Arrow record batches and issues logical scans (filter, project,
//! execute) through [`ColumnarEngine`]. Durability and concurrency control of
//! the physical table belong to the engine.

mod memory;
mod predicate;

pub use memory::MemoryEngine;
pub use predicate::{Predicate, PredicateValue};

use crate::schema::Schema;
use crate::Result;

use arrow_array::RecordBatch;
use async_trait::async_trait;

/// Configuration for engine scans
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Rows per batch handed to scan callbacks
    pub batch_size: usize,
    /// DataFusion target partitions
    pub target_partitions: usize,
    /// Number of buffered inserts that triggers consolidation into one batch
    pub consolidate_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: 1,
            consolidate_threshold: 256,
        }
    }
}

/// Column selection of a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// A single static column
    Column(String),
    /// Every sub-column of a dynamic column group
    Dynamic(String),
}

/// Logical scan over one table
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub table: String,
    pub filter: Option<Predicate>,
    /// Empty means all columns
    pub projection: Vec<Projection>,
}

impl ScanRequest {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
            projection: Vec::new(),
        }
    }

    /// Add a filter, ANDed with any existing one
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn project(mut self, projection: impl IntoIterator<Item = Projection>) -> Self {
        self.projection.extend(projection);
        self
    }

    /// Run the scan on `engine`, handing each result batch to `sink`
    pub async fn execute<F>(self, engine: &dyn ColumnarEngine, mut sink: F) -> Result<()>
    where
        F: FnMut(RecordBatch) -> Result<()> + Send,
    {
        engine.scan(self, &mut sink).await
    }
}

/// Storage and query engine the exemplar store runs on
#[async_trait]
pub trait ColumnarEngine: Send + Sync {
    /// Create a table, or open it if it exists with a schema of the same name
    async fn create_table(&self, name: &str, schema: Schema) -> Result<()>;

    /// Insert rows. The batch may carry any subset of the table's dynamic
    /// sub-columns.
    async fn insert(&self, table: &str, batch: RecordBatch) -> Result<()>;

    /// Execute a scan. Result batches arrive in storage sort order; an error
    /// returned by `sink` stops the scan and is returned unchanged.
    async fn scan(
        &self,
        request: ScanRequest,
        sink: &mut (dyn FnMut(RecordBatch) -> Result<()> + Send),
    ) -> Result<()>;
}
