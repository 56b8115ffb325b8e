//! Fadebox -- ephemeral file-sharing backend.
//!
//! Startup is stateless: all durable state lives in the metadata and
//! object stores, so there is no recovery mode and no shutdown cleanup.
//! SIGTERM/SIGINT handlers only stop accepting connections and wait for
//! in-flight requests before exiting; expired files left behind are
//! reclaimed by the next sweep.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

/// Command-line arguments for the Fadebox server.
#[derive(Parser, Debug)]
#[command(
    name = "fadebox",
    version,
    about = "Ephemeral file-sharing backend with self-destructing downloads"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "fadebox.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = fadebox::config::load_config(&cli.config)?;

    // Initialize tracing / logging. RUST_LOG wins over the config level.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));
    match config.logging.format.as_str() {
        "json" => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    info!("Loaded configuration from {}", cli.config);

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    // Initialize Prometheus metrics recorder and register metric descriptions.
    fadebox::metrics::init_metrics();
    fadebox::metrics::describe_metrics();
    info!("Prometheus metrics initialized");

    // Initialize the metadata store.
    let metadata: Arc<dyn fadebox::metadata::store::MetadataStore> =
        match config.metadata.engine.as_str() {
            "workers-kv" => {
                let store = fadebox::metadata::workers_kv::WorkersKvMetadataStore::new(
                    config.metadata.workers_kv.clone(),
                )?;
                info!("Workers KV metadata store initialized");
                Arc::new(store)
            }
            _ => {
                info!("In-memory metadata store initialized");
                Arc::new(fadebox::metadata::memory::MemoryMetadataStore::new())
            }
        };

    // Initialize the object store.
    let signed_url_ttl = Duration::from_secs(config.lifecycle.signed_url_ttl_seconds);
    let objects: Arc<dyn fadebox::storage::backend::ObjectStore> =
        match config.storage.backend.as_str() {
            "s3" => {
                let s3_config = config.storage.s3.as_ref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "storage.backend is 's3' but storage.s3 config section is missing"
                    )
                })?;
                let backend = fadebox::storage::s3::S3ObjectStore::new(s3_config, signed_url_ttl)
                    .await?;
                Arc::new(backend)
            }
            _ => {
                info!("In-memory object store initialized");
                Arc::new(fadebox::storage::memory::MemoryObjectStore::new())
            }
        };

    let lifecycle = fadebox::lifecycle::Lifecycle::new(
        metadata,
        objects,
        Duration::from_secs(config.lifecycle.expiry_ttl_seconds),
    );

    // Background sweeper: reclaims expired files on an interval. The
    // on-demand POST /api/sweep endpoint works either way.
    let sweep_interval = config.lifecycle.sweep_interval_seconds;
    if sweep_interval > 0 {
        let sweeper = lifecycle.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(sweep_interval));
            // The first tick fires immediately; skip it so startup stays quick.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match sweeper.sweep().await {
                    Ok(0) => {}
                    Ok(purged) => info!("Background sweep purged {} records", purged),
                    Err(e) => warn!("Background sweep failed: {}", e),
                }
            }
        });
        info!("Background sweeper running every {}s", sweep_interval);
    } else {
        info!("Background sweeper disabled; rely on POST /api/sweep");
    }

    // Build AppState.
    let state = Arc::new(fadebox::AppState {
        config: config.clone(),
        lifecycle,
    });

    let app = fadebox::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Fadebox listening on {}", bind_addr);

    // Graceful shutdown: on SIGTERM/SIGINT, stop accepting new connections,
    // wait for in-flight requests to complete, then exit.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Fadebox shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
