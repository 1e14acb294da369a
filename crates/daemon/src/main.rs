mod api;
mod console;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qsequencer_core::{
    load_config, validate_config, Clock, Config, ConnectionSupervisor, QBittorrentClient,
    SanitizedConfig, Sequencer, TickScheduler, TokioClock, TorrentClient,
};

use api::create_router;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file used when `QSEQUENCER_CONFIG` is not set. May be absent.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("qSequencer {} starting", VERSION);

    let config = load(config_path())?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    info!(
        "Configuration loaded: {}",
        serde_json::to_string(&sanitized).unwrap_or_default()
    );

    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let poll_interval = config.sequencer.poll_interval();

    info!("Initializing qBittorrent client at {}", config.qbittorrent.url);
    let client: Arc<dyn TorrentClient> = Arc::new(
        QBittorrentClient::new(config.qbittorrent.clone())
            .context("Failed to create qBittorrent client")?,
    );

    let supervisor = Arc::new(ConnectionSupervisor::new(
        client,
        Arc::clone(&clock),
        poll_interval,
    ));
    let sequencer = Arc::new(
        Sequencer::new(
            config.sequencer.clone(),
            Arc::clone(&supervisor),
            Arc::clone(&clock),
        )
        .with_event_callback(console::console_callback()),
    );
    let scheduler = TickScheduler::new(
        Arc::clone(&sequencer),
        Arc::clone(&supervisor),
        clock,
        poll_interval,
    );

    let server = if config.api.enabled {
        Some(spawn_api(&config, sequencer, supervisor).await?)
    } else {
        info!("Status API disabled in config");
        None
    };

    scheduler.run(shutdown_signal()).await;

    if let Some(server) = server {
        server.abort();
    }
    info!("qSequencer stopped");

    Ok(())
}

/// `QSEQUENCER_CONFIG` if set, otherwise `config.toml` when it exists.
fn config_path() -> Option<PathBuf> {
    match std::env::var("QSEQUENCER_CONFIG") {
        Ok(path) => Some(PathBuf::from(path)),
        Err(_) => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            default.exists().then_some(default)
        }
    }
}

fn load(path: Option<PathBuf>) -> Result<Config> {
    match &path {
        Some(path) => info!("Loading configuration from {:?}", path),
        None => info!("No configuration file, using environment only"),
    }
    load_config(path.as_deref()).with_context(|| match &path {
        Some(path) => format!("Failed to load config from {:?}", path),
        None => "Failed to load config from environment".to_string(),
    })
}

async fn spawn_api(
    config: &Config,
    sequencer: Arc<Sequencer>,
    supervisor: Arc<ConnectionSupervisor>,
) -> Result<tokio::task::JoinHandle<()>> {
    let state = Arc::new(AppState::new(config.clone(), sequencer, supervisor));
    let app = create_router(state);

    let addr = SocketAddr::new(config.api.host, config.api.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Status API listening on {}", addr);

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Status API error: {}", e);
        }
    }))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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

    info!("Shutdown signal received");
}
