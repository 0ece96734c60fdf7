//! Watchcast Server
//!
//! Streams resource change events to WebSocket clients, one namespace per
//! connection.

mod api;
mod config;
mod server;
mod shutdown;
mod state;
mod watchers;

use clap::Parser;
use config::ConfigLoader;
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use watchcast_core::session::SessionRegistry;
use watchers::Watchers;

/// Watchcast - real-time resource change notifications over WebSocket
#[derive(Parser, Debug)]
#[command(name = "watchcast-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "WATCHCAST_CONFIG", default_value = "./watchcast.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.json_logs);

    tracing::info!("Starting watchcast-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // One registry shared by every pipeline and the handshake handler
    let registry = SessionRegistry::new();
    let watchers = Watchers::start(&loaded_config.resources, &loaded_config.queue, &registry);

    // Create application state
    let state = AppState::new(registry.clone(), loaded_config.session, watchers.sources());

    // Spawn config reload handler (listens for SIGHUP)
    let shutdown_notify = spawn_config_reload_handler(state.clone(), config_loader);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", loaded_config.listen);
    let result = run_server(router, loaded_config.listen).await;

    // Signal the config reload handler to stop
    shutdown_notify.notify_one();

    // Drain the pipelines, then disconnect the remaining clients
    watchers.shutdown().await;
    tracing::info!(sessions = registry.len(), "Closing sessions...");
    registry.close_all();
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
