mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use gauntlet_bot::Bot;
use gauntlet_core::Arbiter;
use gauntlet_gateway::connection;
use gauntlet_gateway::dispatcher::Dispatcher;

use crate::config::Config;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    bot: Bot<Dispatcher>,
    bridge_token: Arc<str>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gauntlet=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            eprintln!("FATAL: {}. Set it in your .env file and restart.", e);
            std::process::exit(1);
        }
    };

    // Init database
    let db = Arc::new(gauntlet_db::Database::open(&config.db_path)?);
    info!("Database ready at {}", config.db_path.display());

    // Shared state
    let arbiter = Arbiter::with_timeout(db, config.store_timeout);
    let dispatcher = Dispatcher::new(config.bridge_timeout);
    let bot = Bot::new(
        arbiter,
        dispatcher.clone(),
        config.emoji.clone(),
        config.bot_user_id.clone(),
    );

    let state = ServerState {
        dispatcher,
        bot,
        bridge_token: Arc::from(config.bridge_token.as_str()),
    };

    let app = Router::new()
        .route("/gateway", get(ws_upgrade))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    info!("Gauntlet listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.bot, state.bridge_token)
    })
}

async fn health(State(state): State<ServerState>) -> &'static str {
    if state.dispatcher.is_connected().await {
        "ok"
    } else {
        "ok (no bridge)"
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
