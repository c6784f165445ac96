//! Publish side of the Redis message bus.
//!
//! Handlers publish through the `MessageBus` trait rather than a concrete
//! Redis client, which keeps them testable without a broker. The production
//! implementation shares one auto-reconnecting multiplexed connection for
//! all publish traffic; the subscribe side uses its own dedicated pub/sub
//! connection (see `subscriber`) and never goes through this type.

use async_trait::async_trait;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::Mutex;

/// Failure to hand a payload to the bus.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("redis publish failed: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("bus unavailable: {0}")]
    Unavailable(String),
}

/// Capability to publish a payload to a named channel.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), PublishError>;
}

/// `MessageBus` backed by a Redis connection manager.
pub struct RedisBus {
    client: redis::Client,
    /// Lazily created so the server can start while Redis is down; the
    /// connection manager reconnects by itself once established.
    conn: Mutex<Option<redis::aio::ConnectionManager>>,
}

impl RedisBus {
    /// Create a bus from a Redis URI. No I/O happens here; the first
    /// publish establishes the connection.
    pub fn new(redis_url: &str) -> Result<Self, PublishError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    /// Get or create the shared publish connection.
    async fn connection(&self) -> Result<redis::aio::ConnectionManager, PublishError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_connection_manager().await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), PublishError> {
        let mut conn = self.connection().await?;
        let receivers: i64 = conn.publish(channel, payload).await?;
        tracing::debug!(
            "Published message to channel '{}' ({} subscribers)",
            channel,
            receivers
        );
        Ok(())
    }
}
