mod artifacts;
mod config;
mod conversion;
mod errors;
mod models;
mod pipeline;
mod render;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::artifacts::{ArtifactStore, Sweeper};
use crate::config::Config;
use crate::conversion::GotenbergClient;
use crate::pipeline::RenderPipeline;
use crate::routes::{build_router, cors_layer};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cvforge v{}", env!("CARGO_PKG_VERSION"));

    // The store directory is the one hard startup dependency.
    let store = ArtifactStore::open(&config.artifact_dir).with_context(|| {
        format!(
            "Failed to initialize artifact directory {}",
            config.artifact_dir.display()
        )
    })?;
    let store = Arc::new(store);
    info!("Artifact store at {}", store.root().display());

    let converter = GotenbergClient::new(&config.gotenberg_url, config.conversion_timeout)
        .context("Failed to build conversion client")?;
    info!(
        "Conversion client initialized (endpoint: {}, timeout: {}s)",
        converter.endpoint(),
        config.conversion_timeout.as_secs()
    );

    let sweeper = Sweeper::spawn(Arc::clone(&store), config.sweep);

    let pipeline = Arc::new(RenderPipeline::new(Arc::clone(&store), Arc::new(converter)));

    // Build app state
    let state = AppState {
        store,
        pipeline,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.allowed_origins)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let sweep_status = sweeper.status();
    info!(
        "Stopping artifact sweeper ({:?}, {} cycles completed)",
        sweep_status.phase, sweep_status.cycles_completed
    );
    sweeper.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received, draining connections");
}
