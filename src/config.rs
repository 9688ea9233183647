//! Component factory for environment-based configuration
//!
//! Builds the columnar engine and the exemplar store backend from
//! configuration and environment variables, so binaries and tests switch
//! backends without code changes.

use crate::engine::{ColumnarEngine, EngineConfig, MemoryEngine};
use crate::store::{self, ExemplarStore, StoreConfig, StoreKind};
use crate::{Error, Result};

use std::sync::Arc;
use tracing::info;

pub const ENV_ENGINE_BACKEND: &str = "ENGINE_BACKEND";
pub const ENV_STORE_BACKEND: &str = "STORE_BACKEND";

pub struct ComponentFactory;

impl ComponentFactory {
    /// Create the columnar engine from environment
    ///
    /// Environment variables:
    /// - ENGINE_BACKEND: "memory" (default)
    pub fn create_engine(config: &EngineConfig) -> Result<Arc<dyn ColumnarEngine>> {
        let backend = std::env::var(ENV_ENGINE_BACKEND).unwrap_or_else(|_| "memory".to_string());
        Self::create_engine_for(&backend, config)
    }

    /// Create a named engine backend
    pub fn create_engine_for(
        backend: &str,
        config: &EngineConfig,
    ) -> Result<Arc<dyn ColumnarEngine>> {
        match backend.trim().to_ascii_lowercase().as_str() {
            "memory" => {
                info!(
                    batch_size = config.batch_size,
                    target_partitions = config.target_partitions,
                    "Using in-memory columnar engine"
                );
                Ok(Arc::new(MemoryEngine::new(config.clone())))
            }
            other => Err(Error::Config(format!(
                "Unknown {}: {}. Use 'memory'",
                ENV_ENGINE_BACKEND, other
            ))),
        }
    }

    /// Resolve the store backend tag, falling back to STORE_BACKEND and then
    /// the default backend
    pub fn resolve_store_kind(raw: Option<&str>) -> Result<StoreKind> {
        let raw = raw
            .map(str::to_string)
            .or_else(|| std::env::var(ENV_STORE_BACKEND).ok());
        match raw {
            Some(raw) if !raw.trim().is_empty() => raw.parse::<StoreKind>().map_err(Error::Config),
            _ => Ok(StoreKind::default()),
        }
    }

    /// Create the exemplar store on top of `engine`
    pub async fn create_store(
        config: &StoreConfig,
        engine: Arc<dyn ColumnarEngine>,
    ) -> Result<Arc<dyn ExemplarStore>> {
        info!(backend = %config.kind, table = %config.table, "Creating exemplar store");
        store::open(config, engine).await
    }

    /// Engine and store in one step
    pub async fn create_from_env(config: &StoreConfig) -> Result<Arc<dyn ExemplarStore>> {
        let engine = Self::create_engine(&config.engine)?;
        Self::create_store(config, engine).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_engine_backend_is_config_error() {
        let result = ComponentFactory::create_engine_for("cassandra", &EngineConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(ComponentFactory::create_engine_for(" Memory ", &EngineConfig::default()).is_ok());
    }

    #[test]
    fn test_explicit_store_kind_wins() {
        assert_eq!(
            ComponentFactory::resolve_store_kind(Some("columnar")).unwrap(),
            StoreKind::Columnar
        );
        assert!(matches!(
            ComponentFactory::resolve_store_kind(Some("bogus")),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_create_store_opens_table() {
        let engine = ComponentFactory::create_engine_for("memory", &EngineConfig::default()).unwrap();
        let store = ComponentFactory::create_store(&StoreConfig::default(), engine)
            .await
            .unwrap();
        let results = store
            .select(0, 10, &[vec![crate::model::Matcher::equal("job", "a")]])
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
