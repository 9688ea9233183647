//! Exemplar storage
//!
//! [`ExemplarStore`] is the capability pair the API layer talks to. The
//! backend is picked once at startup from a [`StoreKind`] tag; the only
//! backend today is [`ColumnarExemplarStore`], which maps exemplars onto a
//! table with dynamic label columns inside a [`ColumnarEngine`].

mod columnar;
mod decoder;
mod encoder;
mod grouper;
mod telemetry;
mod translate;

pub use columnar::ColumnarExemplarStore;
pub use decoder::decode;
pub use encoder::encode_row;
pub use grouper::{group, SeriesGrouper};
pub use translate::translate;

use crate::engine::{ColumnarEngine, EngineConfig};
use crate::model::{Exemplar, Labels, Matcher, QueryResult};
use crate::{Error, Result};

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Default table holding exemplars
pub const DEFAULT_TABLE: &str = "exemplars";

/// Append and query exemplars
#[async_trait]
pub trait ExemplarStore: Send + Sync {
    /// Store one exemplar of `series`. Identical appends are stored twice.
    async fn append(&self, series: &Labels, exemplar: &Exemplar) -> Result<()>;

    /// All exemplars with `start < timestamp < end` whose series matches any
    /// of the matcher groups, one result per series.
    async fn select(
        &self,
        start: i64,
        end: i64,
        matchers: &[Vec<Matcher>],
    ) -> Result<Vec<QueryResult>>;
}

/// Store backend tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    #[default]
    Columnar,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Columnar => "columnar",
        }
    }
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "columnar" => Ok(Self::Columnar),
            other => Err(format!(
                "unknown store backend '{}'; expected one of columnar",
                other
            )),
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Table exemplars are written to
    pub table: String,
    pub engine: EngineConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            table: DEFAULT_TABLE.to_string(),
            engine: EngineConfig::default(),
        }
    }
}

/// Open the configured store backend on `engine`
pub async fn open(
    config: &StoreConfig,
    engine: Arc<dyn ColumnarEngine>,
) -> Result<Arc<dyn ExemplarStore>> {
    if config.table.trim().is_empty() {
        return Err(Error::Config("store table name cannot be empty".to_string()));
    }
    match config.kind {
        StoreKind::Columnar => {
            info!(table = %config.table, "Opening columnar exemplar store");
            Ok(Arc::new(
                ColumnarExemplarStore::open(engine, &config.table).await?,
            ))
        }
    }
}
