//! Per-room message handlers and the static room registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::bus::{MessageBus, PublishError};
use super::messages::ChatMessage;

/// Error surfaced from a handler to the connection gateway, where it is
/// logged without closing the connection.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Gatekeeper between an inbound WebSocket frame and the Redis bus.
///
/// Implementations validate the raw payload and, when valid, publish it to
/// the bus. They never deliver to local connections directly: delivery
/// always round-trips through Redis so every process (including this one)
/// observes the same fan-out path.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, data: serde_json::Value) -> Result<(), HandlerError>;
}

/// Handler for chat rooms. Validates the `{ room, name, message }` payload
/// and publishes it to `<prefix><room>`.
pub struct ChatHandler {
    room: String,
    channel_prefix: String,
    bus: Arc<dyn MessageBus>,
}

impl ChatHandler {
    pub fn new(room: impl Into<String>, channel_prefix: impl Into<String>, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            room: room.into(),
            channel_prefix: channel_prefix.into(),
            bus,
        }
    }
}

#[async_trait]
impl MessageHandler for ChatHandler {
    async fn handle(&self, data: serde_json::Value) -> Result<(), HandlerError> {
        let msg = match serde_json::from_value::<ChatMessage>(data.clone()) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!("Invalid chat payload: {} | data: {}", e, data);
                return Ok(());
            }
        };

        if let Err(e) = msg.validate(&self.room) {
            tracing::error!("Rejected chat payload: {} | data: {}", e, data);
            return Ok(());
        }

        // The channel is derived from the room inside the payload, already
        // checked against the handler's own room above.
        let channel = format!("{}{}", self.channel_prefix, msg.room);
        let payload = serde_json::to_string(&msg)?;
        self.bus.publish(&channel, &payload).await?;
        Ok(())
    }
}

/// Static registry mapping a room name to its message handler, built once
/// at startup. Connections to rooms absent from the registry are rejected
/// before a gateway is started.
#[derive(Default)]
pub struct RoomRegistry {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a room name. Called during wiring only; the
    /// registry is immutable once the server is serving.
    pub fn register(&mut self, room: impl Into<String>, handler: Arc<dyn MessageHandler>) {
        self.handlers.insert(room.into(), handler);
    }

    pub fn get(&self, room: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.get(room).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex;

    // Mock MessageBus recording every published (channel, payload) pair.
    struct RecordingBus {
        published: Mutex<Vec<(String, String)>>,
    }

    impl RecordingBus {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                published: Mutex::new(Vec::new()),
            })
        }

        async fn records(&self) -> Vec<(String, String)> {
            self.published.lock().await.clone()
        }
    }

    #[async_trait]
    impl MessageBus for RecordingBus {
        async fn publish(&self, channel: &str, payload: &str) -> Result<(), PublishError> {
            self.published
                .lock()
                .await
                .push((channel.to_string(), payload.to_string()));
            Ok(())
        }
    }

    // Mock MessageBus that always fails, for error propagation tests.
    struct FailingBus;

    #[async_trait]
    impl MessageBus for FailingBus {
        async fn publish(&self, _channel: &str, _payload: &str) -> Result<(), PublishError> {
            Err(PublishError::Unavailable("broker down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_valid_message_is_published_to_room_channel() {
        // given: a chat handler with a recording bus
        let bus = RecordingBus::new();
        let handler = ChatHandler::new("chat", "room:", bus.clone());

        // when: handling a valid payload
        let result = handler
            .handle(json!({"room": "chat", "name": "Tom", "message": "hi"}))
            .await;

        // then: the serialized message went to the prefixed room channel
        assert!(result.is_ok());
        let published = bus.records().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "room:chat");
        assert_eq!(
            published[0].1,
            r#"{"room":"chat","name":"Tom","message":"hi"}"#
        );
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_dropped_without_error() {
        // given:
        let bus = RecordingBus::new();
        let handler = ChatHandler::new("chat", "room:", bus.clone());

        // when: the payload is missing required fields
        let result = handler.handle(json!({"room": "chat", "name": "Tom"})).await;

        // then: the frame is dropped silently, nothing published
        assert!(result.is_ok());
        assert!(bus.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_room_in_payload_is_dropped() {
        // given: a handler registered for room "chat"
        let bus = RecordingBus::new();
        let handler = ChatHandler::new("chat", "room:", bus.clone());

        // when: the payload claims a different room
        let result = handler
            .handle(json!({"room": "lobby", "name": "Tom", "message": "hi"}))
            .await;

        // then: dropped, nothing published
        assert!(result.is_ok());
        assert!(bus.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_fields_are_dropped() {
        let bus = RecordingBus::new();
        let handler = ChatHandler::new("chat", "room:", bus.clone());

        let result = handler
            .handle(json!({"room": "chat", "name": "", "message": "hi"}))
            .await;

        assert!(result.is_ok());
        assert!(bus.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_bus_failure_surfaces_as_handler_error() {
        // given: a bus that rejects every publish
        let handler = ChatHandler::new("chat", "room:", Arc::new(FailingBus));

        // when: handling an otherwise valid payload
        let result = handler
            .handle(json!({"room": "chat", "name": "Tom", "message": "hi"}))
            .await;

        // then: the error propagates to the gateway (which logs it)
        assert!(matches!(result, Err(HandlerError::Publish(_))));
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        // given: a registry with one room
        let bus = RecordingBus::new();
        let mut registry = RoomRegistry::new();
        registry.register("chat", Arc::new(ChatHandler::new("chat", "room:", bus)));

        // then: known rooms resolve, unknown rooms do not
        assert!(registry.get("chat").is_some());
        assert!(registry.get("unknown").is_none());
    }
}
