//! WebSocket gateway, per-room message handlers and the Redis subscriber.

pub mod bus;
pub mod handler;
pub mod manager;
pub mod messages;
pub mod rooms;
pub mod runner;
pub mod signal;
pub mod state;
pub mod subscriber;

pub use bus::{MessageBus, PublishError, RedisBus};
pub use manager::{ConnectionId, ConnectionManager};
pub use rooms::{ChatHandler, HandlerError, MessageHandler, RoomRegistry};
pub use runner::{build_router, run_server};
pub use state::AppState;
pub use subscriber::redis_subscriber;
