//! mentora-relay - Workflow Relay Microservice
//!
//! Entry point: resolves configuration, opens the database, and serves
//! the relay HTTP API. The platform talks to this service; this service
//! talks to the automation engine.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mentora_relay::config::RelayConfig;
use mentora_relay::services::orchestrator::ComputeOrchestrator;
use mentora_relay::AppState;

/// Command-line arguments for mentora-relay
#[derive(Parser, Debug)]
#[command(name = "mentora-relay")]
#[command(about = "Workflow relay microservice for Mentora")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "MENTORA_RELAY_PORT")]
    port: Option<u16>,

    /// Path to a TOML config file
    #[arg(short, long, env = "MENTORA_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the SQLite database file (overrides config file)
    #[arg(short, long, env = "MENTORA_DATABASE")]
    database: Option<PathBuf>,

    /// Primary automation engine base URL (overrides config file)
    #[arg(long, env = "MENTORA_ENGINE_BASE_URL")]
    engine_base_url: Option<String>,

    /// Fallback automation engine base URL (overrides config file)
    #[arg(long, env = "MENTORA_ENGINE_FALLBACK_BASE_URL")]
    engine_fallback_base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mentora_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting mentora-relay (Workflow Relay) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        "Build: {} ({}, {})",
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    let mut config = RelayConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;

    if let Some(base_url) = args.engine_base_url {
        config.engine.base_url = base_url;
    }
    if let Some(fallback_url) = args.engine_fallback_base_url {
        config.engine.fallback_base_url = fallback_url;
    }
    if config.engine.base_url.is_empty() {
        warn!("No automation engine base URL configured; every computation will fall back");
    }

    let port = args.port.unwrap_or(config.port);
    let db_path = args.database.unwrap_or_else(|| config.database_path());

    info!("Database: {}", db_path.display());
    let db_pool = mentora_relay::db::init_database_pool(&db_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established");

    let orchestrator = ComputeOrchestrator::new(db_pool.clone(), config.engine)
        .context("Failed to initialize orchestrator")?;
    let state = AppState::new(db_pool, orchestrator);

    let app = mentora_relay::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
