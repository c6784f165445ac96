//! Server wiring and execution.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::config::Settings;

use super::{
    bus::RedisBus,
    handler::{health_check, websocket_handler},
    manager::ConnectionManager,
    rooms::{ChatHandler, RoomRegistry},
    signal::shutdown_signal,
    state::AppState,
    subscriber::redis_subscriber,
};

/// Build the axum router for the chat fan-out endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws/room/{room}", get(websocket_handler))
        .route("/api/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the WebSocket chat fan-out server.
///
/// Wires the room registry, spawns exactly one Redis subscriber task for
/// this process, and serves until a shutdown signal arrives. The
/// subscriber's lifetime is scoped to the server: it is cancelled once the
/// serve loop ends and never restarted afterward.
///
/// # Arguments
///
/// * `host` - The host address to bind to (e.g., "127.0.0.1")
/// * `port` - The port number to bind to (e.g., 8080)
/// * `settings` - Redis and heartbeat settings
pub async fn run_server(
    host: String,
    port: u16,
    settings: Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Arc::new(settings);
    let manager = Arc::new(ConnectionManager::new());

    // Shared publish connection for all room handlers.
    let bus = Arc::new(RedisBus::new(&settings.redis_url)?);

    // Registry of supported rooms and their associated message handlers
    let mut rooms = RoomRegistry::new();
    rooms.register(
        "chat",
        Arc::new(ChatHandler::new("chat", &settings.channel_prefix, bus)),
    );
    // add more handlers here ...

    let state = Arc::new(AppState {
        manager: manager.clone(),
        rooms,
        settings: settings.clone(),
    });

    // Dedicated client for the pub/sub connection; subscribe traffic must
    // not share a connection with publishing.
    let subscriber_client = redis::Client::open(settings.redis_url.as_str())?;
    let subscriber_task = tokio::spawn(redis_subscriber(
        subscriber_client,
        manager,
        settings.clone(),
    ));

    let app = build_router(state);

    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!(
        "WebSocket chat fan-out server listening on {}",
        listener.local_addr()?
    );
    tracing::info!("Connect to: ws://{}/ws/room/chat", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown gracefully");

    // Set up graceful shutdown signal handler
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The subscriber has no terminal state of its own; cancel it with the
    // server and do not restart it.
    subscriber_task.abort();

    tracing::info!("Server shutdown complete");

    Ok(())
}
