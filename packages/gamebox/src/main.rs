use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod config;
mod error;
mod handlers;
mod hub;
mod metrics;
mod models;
mod modes;
mod registry;
#[cfg(test)]
mod test_helpers;
mod words;
mod ws;

use crate::config::GameboxConfig;
use crate::hub::BroadcastHub;
use crate::metrics::ServerMetrics;
use crate::modes::{GameMode, ImposterMode};
use crate::registry::SessionRegistry;
use crate::words::WordList;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "gamebox")]
#[command(about = "Party game server with live session state over WebSocket")]
struct Cli {
    /// Host to bind to (overrides [server].host)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port for the web server (overrides [server].port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to gamebox.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub registry: Arc<SessionRegistry>,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
    pub config: Arc<GameboxConfig>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "gamebox=debug,tower_http=debug,info"
    } else {
        "gamebox=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let file_config: config::FileConfig = config::load_config(cli.config.as_deref())
        .extract()
        .context("Failed to load configuration")?;
    let config = Arc::new(
        GameboxConfig::from_file(&file_config).with_overrides(cli.host.as_deref(), cli.port),
    );

    let words = match &config.word_list {
        Some(path) => {
            let list = WordList::from_json_file(path)?;
            info!("Loaded {} word pairs from {}", list.len(), path.display());
            list
        }
        None => WordList::builtin(),
    };

    let hub = BroadcastHub::new(config.websocket.broadcast_capacity);
    let modes: Vec<Arc<dyn GameMode>> = vec![Arc::new(ImposterMode::new(Arc::new(words)))];
    let registry = Arc::new(SessionRegistry::new(hub, modes, config.registry.clone()));
    let registry_for_shutdown = registry.clone();

    let app_state = AppState {
        registry,
        metrics: Arc::new(ServerMetrics::new()),
        config: config.clone(),
    };

    let app = Router::new()
        .route("/api/game", post(handlers::create_game))
        .route("/api/game/{game_id}/join", post(handlers::join_game))
        .route("/api/game/{game_id}/leave", post(handlers::leave_game))
        .route("/api/game/{game_id}/state", get(handlers::get_game_state))
        .route("/api/game/{game_id}/start", post(handlers::start_game))
        .route("/api/game/{game_id}/action", post(handlers::game_action))
        .route("/api/game/{game_id}/result", get(handlers::get_round_result))
        .route("/api/ws", get(handlers::game_websocket_handler))
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Gamebox listening on http://{}", actual_addr);
    info!("API endpoints:");
    info!("  POST   /api/game                 - Create game");
    info!("  POST   /api/game/:id/join        - Join game");
    info!("  POST   /api/game/:id/leave       - Leave game");
    info!("  GET    /api/game/:id/state       - Current game state");
    info!("  POST   /api/game/:id/start       - Start a round (host)");
    info!("  POST   /api/game/:id/action      - Player action");
    info!("  GET    /api/game/:id/result      - Round result after reveal");
    info!("  GET    /api/ws                   - Live game state");

    // Create shutdown signal handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error");

    registry_for_shutdown.shutdown().await;
    info!("Shutdown complete");
    server_result
}
