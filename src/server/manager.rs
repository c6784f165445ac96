//! In-process registry of live WebSocket connections, grouped by room.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

/// Process-unique identifier for one WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outbound channel of one connection. Each socket has a pusher task
/// draining this channel into its sink; a send error means that task is
/// gone and the connection is dead.
pub type ConnectionSender = mpsc::UnboundedSender<String>;

/// Tracks live connections per room and broadcasts payloads to them.
///
/// This registry is the only state shared between the per-connection tasks
/// and the Redis subscriber task. It never touches Redis itself.
pub struct ConnectionManager {
    /// Map of room name to the connections currently joined to it.
    /// A room with zero connections is removed from the map immediately.
    rooms: Mutex<HashMap<String, HashMap<ConnectionId, ConnectionSender>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Register a connection under a room, creating the room entry on demand.
    pub async fn add(&self, room: &str, id: ConnectionId, sender: ConnectionSender) {
        let mut rooms = self.rooms.lock().await;
        rooms.entry(room.to_string()).or_default().insert(id, sender);
        tracing::debug!("Connection '{}' added to room '{}'", id, room);
    }

    /// Unregister a connection. No-op if it was already absent. Deletes the
    /// room entry when its last connection leaves.
    pub async fn remove(&self, room: &str, id: &ConnectionId) {
        let mut rooms = self.rooms.lock().await;
        if let Some(connections) = rooms.get_mut(room) {
            connections.remove(id);
            if connections.is_empty() {
                rooms.remove(room);
            }
        }
    }

    /// Number of connections currently registered in a room.
    pub async fn connection_count(&self, room: &str) -> usize {
        let rooms = self.rooms.lock().await;
        rooms.get(room).map_or(0, HashMap::len)
    }

    /// Whether the room has an entry in the registry at all.
    pub async fn has_room(&self, room: &str) -> bool {
        let rooms = self.rooms.lock().await;
        rooms.contains_key(room)
    }

    /// Send `payload` verbatim to every connection in `room`.
    ///
    /// A snapshot of the room is taken before sending so that disconnects
    /// happening mid-broadcast cannot invalidate the iteration. A failed
    /// send marks that connection dead: it is removed from the room and the
    /// broadcast continues with the remaining connections.
    pub async fn broadcast(&self, room: &str, payload: &str) {
        let targets: Vec<(ConnectionId, ConnectionSender)> = {
            let rooms = self.rooms.lock().await;
            match rooms.get(room) {
                Some(connections) => connections
                    .iter()
                    .map(|(id, sender)| (*id, sender.clone()))
                    .collect(),
                None => return,
            }
        };

        for (id, sender) in targets {
            if sender.send(payload.to_string()).is_err() {
                tracing::warn!("Dropping dead WebSocket connection '{}' in room '{}'", id, room);
                self.remove(room, &id).await;
            }
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_connection() -> (ConnectionId, ConnectionSender, mpsc::UnboundedReceiver<String>)
    {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionId::new(), tx, rx)
    }

    #[tokio::test]
    async fn test_add_and_count_connections() {
        // given: an empty manager
        let manager = ConnectionManager::new();
        let (id1, tx1, _rx1) = create_test_connection();
        let (id2, tx2, _rx2) = create_test_connection();

        // when: two connections join the same room
        manager.add("chat", id1, tx1).await;
        manager.add("chat", id2, tx2).await;

        // then: both are registered
        assert_eq!(manager.connection_count("chat").await, 2);
        assert_eq!(manager.connection_count("other").await, 0);
    }

    #[tokio::test]
    async fn test_remove_is_noop_when_absent() {
        // given: a manager with no registered connections
        let manager = ConnectionManager::new();
        let (id, _tx, _rx) = create_test_connection();

        // when: removing an unknown connection
        manager.remove("chat", &id).await;

        // then: no panic, registry still empty
        assert!(!manager.has_room("chat").await);
    }

    #[tokio::test]
    async fn test_empty_room_is_pruned() {
        // given: a room with one connection
        let manager = ConnectionManager::new();
        let (id, tx, _rx) = create_test_connection();
        manager.add("chat", id, tx).await;
        assert!(manager.has_room("chat").await);

        // when: the last connection leaves
        manager.remove("chat", &id).await;

        // then: the room entry itself is gone
        assert!(!manager.has_room("chat").await);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_room_members() {
        // given: two connections in the room
        let manager = ConnectionManager::new();
        let (id1, tx1, mut rx1) = create_test_connection();
        let (id2, tx2, mut rx2) = create_test_connection();
        manager.add("chat", id1, tx1).await;
        manager.add("chat", id2, tx2).await;

        // when: broadcasting a payload
        manager.broadcast("chat", "hello").await;

        // then: both connections receive it verbatim
        assert_eq!(rx1.recv().await, Some("hello".to_string()));
        assert_eq!(rx2.recv().await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn test_broadcast_does_not_cross_rooms() {
        // given: connections in two different rooms
        let manager = ConnectionManager::new();
        let (id1, tx1, mut rx1) = create_test_connection();
        let (id2, tx2, mut rx2) = create_test_connection();
        manager.add("chat", id1, tx1).await;
        manager.add("lobby", id2, tx2).await;

        // when: broadcasting to one room only
        manager.broadcast("chat", "hello").await;

        // then: the other room observes nothing
        assert_eq!(rx1.recv().await, Some("hello".to_string()));
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_to_unknown_room_is_noop() {
        let manager = ConnectionManager::new();

        // No room registered at all; must not panic or create an entry.
        manager.broadcast("nowhere", "hello").await;
        assert!(!manager.has_room("nowhere").await);
    }

    #[tokio::test]
    async fn test_dead_connection_is_pruned_during_broadcast() {
        // given: one live and one dead connection (receiver dropped)
        let manager = ConnectionManager::new();
        let (live_id, live_tx, mut live_rx) = create_test_connection();
        let (dead_id, dead_tx, dead_rx) = create_test_connection();
        manager.add("chat", live_id, live_tx).await;
        manager.add("chat", dead_id, dead_tx).await;
        drop(dead_rx);

        // when: broadcasting twice
        manager.broadcast("chat", "first").await;
        manager.broadcast("chat", "second").await;

        // then: the live connection got both payloads and the dead one was
        // removed after the first failed send
        assert_eq!(live_rx.recv().await, Some("first".to_string()));
        assert_eq!(live_rx.recv().await, Some("second".to_string()));
        assert_eq!(manager.connection_count("chat").await, 1);
    }

    #[tokio::test]
    async fn test_room_recreated_after_prune() {
        // given: a room that was emptied and pruned
        let manager = ConnectionManager::new();
        let (id1, tx1, _rx1) = create_test_connection();
        manager.add("chat", id1, tx1).await;
        manager.remove("chat", &id1).await;
        assert!(!manager.has_room("chat").await);

        // when: a new connection joins the same room name
        let (id2, tx2, _rx2) = create_test_connection();
        manager.add("chat", id2, tx2).await;

        // then: the room exists again
        assert_eq!(manager.connection_count("chat").await, 1);
    }
}
