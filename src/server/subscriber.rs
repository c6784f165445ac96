//! Background task listening to the Redis pattern channel and forwarding
//! published messages to locally connected clients of the matching room.
//! Automatically reconnects on Redis errors with a fixed retry delay.

use std::sync::Arc;

use futures_util::StreamExt;
use thiserror::Error;

use crate::config::Settings;

use super::manager::ConnectionManager;

#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("pub/sub message stream ended (connection lost)")]
    ConnectionLost,
}

/// Run the per-process Redis subscriber until the owning task is cancelled.
///
/// Opens a dedicated pub/sub connection (never shared with publish
/// traffic), pattern-subscribes to every room channel and forwards each
/// delivery to the connection manager. Any connection-level error is
/// logged, waited out for the configured retry delay and retried
/// indefinitely; this loop has no terminal state of its own.
pub async fn redis_subscriber(
    client: redis::Client,
    manager: Arc<ConnectionManager>,
    settings: Arc<Settings>,
) {
    loop {
        if let Err(e) = listen(&client, &manager, &settings).await {
            tracing::error!(
                "Redis subscriber error: {}. Retrying in {:?}...",
                e,
                settings.retry_delay
            );
        }
        tokio::time::sleep(settings.retry_delay).await;
    }
}

/// One subscription session: connect, pattern-subscribe, forward messages
/// until the stream ends or a Redis error occurs.
async fn listen(
    client: &redis::Client,
    manager: &ConnectionManager,
    settings: &Settings,
) -> Result<(), SubscriberError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe(settings.channel_pattern()).await?;
    tracing::info!(
        "Redis subscriber listening on pattern '{}'",
        settings.channel_pattern()
    );

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let channel = msg.get_channel_name().to_string();
        let pattern: Option<String> = msg.get_pattern().ok();

        let data: String = match msg.get_payload() {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(
                    "Skipping Redis message with invalid payload on '{}': {}",
                    channel,
                    e
                );
                continue;
            }
        };

        // Only pattern-subscribed deliveries (pmessage) carry chat traffic;
        // anything else is skipped silently.
        let Some(room) = room_from_channel(&channel, pattern.as_deref(), &settings.channel_prefix)
        else {
            continue;
        };

        // The payload was validated at publish time; hand it over unmodified.
        manager.broadcast(&room, &data).await;
    }

    // The stream only ends when the connection breaks.
    Err(SubscriberError::ConnectionLost)
}

/// Recover the room name from a pub/sub delivery.
///
/// Returns `None` for deliveries that did not arrive through the pattern
/// subscription or whose channel does not carry the fixed prefix.
fn room_from_channel(channel: &str, pattern: Option<&str>, prefix: &str) -> Option<String> {
    pattern?;
    channel.strip_prefix(prefix).map(str::to_string)
}
