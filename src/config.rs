//! Runtime settings for the chat fan-out subsystem.

use std::time::Duration;

/// Settings consumed by the WebSocket gateway and the Redis subscriber.
///
/// The larger application is expected to construct this once at startup
/// (the `server` binary fills it from command line arguments) and share it
/// behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Redis connection URI, e.g. `redis://127.0.0.1:6379/0`
    pub redis_url: String,
    /// Fixed prefix for room channels; room `chat` publishes to `room:chat`
    pub channel_prefix: String,
    /// Exact text frame a client sends as a heartbeat
    pub heartbeat_ping: String,
    /// Exact text frame replied to a heartbeat, never broadcast
    pub heartbeat_pong: String,
    /// Fixed delay between Redis reconnection attempts
    pub retry_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            channel_prefix: "room:".to_string(),
            heartbeat_ping: "ping".to_string(),
            heartbeat_pong: "pong".to_string(),
            retry_delay: Duration::from_secs(5),
        }
    }
}

impl Settings {
    /// Full pattern the subscriber listens on, covering every room channel.
    pub fn channel_pattern(&self) -> String {
        format!("{}*", self.channel_prefix)
    }
}
