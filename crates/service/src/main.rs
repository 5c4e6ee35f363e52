mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cdr_ingestor_core::{load_config_or_default, validate_config, IngestOrchestrator};

use api::create_router;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    // Determine config path
    let config_path = std::env::var("CDR_INGESTOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!(version = VERSION, "Configuration loaded successfully");
    info!("Source directory: {:?}", config.files.source_dir);
    info!("Archive directory: {:?}", config.files.archive_dir);
    info!("Database path: {:?}", config.storage.path);

    // Build and initialize the orchestrator
    let orchestrator = Arc::new(
        IngestOrchestrator::from_config(config.clone())
            .context("Failed to create ingest orchestrator")?,
    );
    orchestrator
        .initialize()
        .await
        .context("Failed to initialize ingest orchestrator")?;

    // Translate process signals into a cooperative shutdown request
    {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            shutdown_signal().await;
            orchestrator.request_shutdown();
        });
    }

    // Start the status server if enabled
    let server_handle = if config.http.enabled {
        let addr = SocketAddr::new(config.http.host, config.http.port);
        let state = Arc::new(AppState::new(Arc::clone(&orchestrator)));
        let app = create_router(state);

        info!("Starting status server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        let shutdown = orchestrator.shutdown_signal();
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.requested().await })
                .await
        }))
    } else {
        None
    };

    orchestrator
        .run_forever()
        .await
        .context("Ingestion loop failed")?;

    if let Some(handle) = server_handle {
        handle
            .await
            .context("Status server task panicked")?
            .context("Status server error")?;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Install the global subscriber. `CDR_LOG_FORMAT=json` switches to JSON lines.
fn init_logging() {
    let json = std::env::var("CDR_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
