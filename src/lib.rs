//! # Exemplars Storage
//!
//! Storage for Prometheus exemplars on a columnar engine.
//!
//! Exemplars carry their own label set next to the labels of the series they
//! belong to. Both label sets are stored as dynamic column groups: every
//! label name ever written becomes a dictionary-encoded sub-column
//! (`labels.<name>`, `exemplar_labels.<name>`), and rows without that label
//! hold a null. Storage is sorted by series labels, then exemplar labels,
//! then timestamp.
//!
//! ## Architecture
//!
//! - **Schema**: column groups, storage layout and sort order of the table
//! - **Store**: row encoding, matcher translation, result decoding and
//!   series grouping behind [`store::ExemplarStore`]
//! - **Engine**: the columnar storage/query boundary, with a DataFusion-backed
//!   in-memory implementation
//! - **API**: Prometheus remote write and `query_exemplars` over HTTP

pub mod api;
pub mod config;
pub mod engine;
pub mod model;
pub mod schema;
pub mod selector;
pub mod store;
pub mod telemetry;

mod error;

pub use error::{Error, Result};

/// Configuration for the exemplars service
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Store backend, table and engine settings
    pub store: store::StoreConfig,
    /// HTTP API settings
    pub api: api::ApiServerConfig,
}

/// Re-exports for convenience
pub mod prelude {
    pub use crate::engine::{ColumnarEngine, EngineConfig, MemoryEngine};
    pub use crate::model::{Exemplar, Label, Labels, MatchType, Matcher, QueryResult};
    pub use crate::store::{ColumnarExemplarStore, ExemplarStore, StoreConfig, StoreKind};
    pub use crate::{Config, Error, Result};
}
