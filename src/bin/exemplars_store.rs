//! Exemplars Store Binary
//!
//! Serves Prometheus remote write and exemplar queries over HTTP.

use exemplars_storage::api::{self, ApiServerConfig};
use exemplars_storage::config::ComponentFactory;
use exemplars_storage::engine::EngineConfig;
use exemplars_storage::store::StoreConfig;
use exemplars_storage::telemetry::Telemetry;
use exemplars_storage::Error;

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

/// Exemplars Store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HTTP API port
    #[arg(long, default_value = "10902")]
    http_port: u16,

    /// Store backend (columnar)
    #[arg(long, env = "STORE_BACKEND", default_value = "columnar")]
    store: String,

    /// Columnar engine backend (memory)
    #[arg(long, env = "ENGINE_BACKEND", default_value = "memory")]
    engine: String,

    /// Table exemplars are written to
    #[arg(long, default_value = "exemplars")]
    table: String,

    /// Rows per scan batch
    #[arg(long, default_value = "8192")]
    batch_size: usize,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Seconds to wait for in-flight requests on shutdown
    #[arg(long, default_value = "120")]
    grace_period_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _telemetry = Telemetry::init("exemplars-store", &args.log_level)?;

    info!("Starting exemplars store");

    let store_config = StoreConfig {
        kind: ComponentFactory::resolve_store_kind(Some(&args.store))?,
        table: args.table.clone(),
        engine: EngineConfig {
            batch_size: args.batch_size.max(1),
            ..Default::default()
        },
    };

    let engine = ComponentFactory::create_engine_for(&args.engine, &store_config.engine)?;
    let store = ComponentFactory::create_store(&store_config, engine).await?;

    let api_config = ApiServerConfig {
        http_port: args.http_port,
        ..Default::default()
    };
    let router = api::build_http_router_with_config(store, &api_config);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.http_port));
    let listener = TcpListener::bind(addr).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    info!(
        http_port = args.http_port,
        store = %store_config.kind,
        engine = %args.engine,
        table = %store_config.table,
        "Exemplars store ready"
    );

    let grace_period = Duration::from_secs(args.grace_period_secs);
    let deadline_rx = shutdown_rx.clone();
    let server = async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
            .await
            .map_err(|e| Error::Internal(format!("HTTP server error: {e}")))
    };
    let deadline = async move {
        wait_for_shutdown(deadline_rx).await;
        tokio::time::sleep(grace_period).await;
    };

    tokio::select! {
        result = server => result?,
        _ = deadline => {
            warn!(
                grace_period_secs = args.grace_period_secs,
                "Grace period elapsed with requests still in flight"
            );
        }
    }

    info!("Exemplars store shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    if *shutdown.borrow() {
        return;
    }
    let _ = shutdown.changed().await;
}
