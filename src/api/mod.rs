//! HTTP API
//!
//! - Prometheus Remote Write ingestion of exemplars
//! - Prometheus-compatible exemplar queries
//! - Health and readiness endpoints

pub mod ingest;
pub mod query;
mod telemetry;

use crate::store::ExemplarStore;

use axum::Router;
use std::sync::Arc;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// HTTP API port
    pub http_port: u16,
    /// Maximum request body size
    pub max_body_size: usize,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            http_port: 10902,
            max_body_size: 16 * 1024 * 1024, // 16MB
            enable_cors: true,
        }
    }
}

/// Build the HTTP API router with the default configuration
pub fn build_http_router(store: Arc<dyn ExemplarStore>) -> Router {
    build_http_router_with_config(store, &ApiServerConfig::default())
}

/// Build the HTTP API router
pub fn build_http_router_with_config(
    store: Arc<dyn ExemplarStore>,
    config: &ApiServerConfig,
) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::middleware;
    use axum::routing::{get, post};
    use tower_http::cors::{Any, CorsLayer};

    let router = Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))

        // Prometheus Remote Write
        .route("/api/v1/write", post(ingest::remote_write::handle_remote_write))

        // Exemplar queries
        .route(
            "/api/v1/query_exemplars",
            get(query::exemplars::query_exemplars_get).post(query::exemplars::query_exemplars_post),
        )

        // State
        .with_state(ApiState { store })
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(middleware::from_fn(telemetry::http_observability_middleware));

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    }
}

/// Shared API state
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn ExemplarStore>,
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn ready_check() -> &'static str {
    "READY"
}
