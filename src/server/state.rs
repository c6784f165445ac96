//! Shared application state.

use std::sync::Arc;

use crate::config::Settings;

use super::manager::ConnectionManager;
use super::rooms::RoomRegistry;

/// State shared by the WebSocket route handlers. The connection manager is
/// additionally shared with the Redis subscriber task; nothing here is a
/// process-level global.
pub struct AppState {
    /// Registry of live connections per room
    pub manager: Arc<ConnectionManager>,
    /// Static room name to message handler mapping, fixed at startup
    pub rooms: RoomRegistry,
    /// Runtime settings (heartbeat sentinels, channel prefix, ...)
    pub settings: Arc<Settings>,
}
