//! In-process chat relay: rooms keyed by conversation id.
//!
//! Every websocket connection registers here and gets a bounded outgoing
//! queue. The relay forwards frames between room members and never
//! persists anything; saving messages goes through `chat`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Frames buffered per connection before new ones are dropped.
pub const CONNECTION_QUEUE_CAPACITY: usize = 64;

pub type ConnectionId = Uuid;

// ─── Wire events ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub conversation_id: String,
    pub message: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub conversation_id: String,
    pub user_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    pub connection_id: ConnectionId,
}

/// Frames a client may send: `{"event": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinConversation(String),
    LeaveConversation(String),
    SendMessage(SendMessagePayload),
    Typing(TypingPayload),
}

/// Frames the relay pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected(ConnectedPayload),
    ReceiveMessage(serde_json::Value),
    Typing(TypingPayload),
}

// ─── Hub ──────────────────────────────────────────────────

#[derive(Default)]
struct Rooms {
    connections: HashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
    members: HashMap<String, HashSet<ConnectionId>>,
}

/// Shared room table. Cheap to clone; all clones see the same rooms.
#[derive(Clone, Default)]
pub struct RoomHub {
    rooms: Arc<RwLock<Rooms>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Rooms> {
        self.rooms.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Rooms> {
        self.rooms.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new connection and return its id and outgoing queue.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(CONNECTION_QUEUE_CAPACITY);
        let id = Uuid::new_v4();
        self.write().connections.insert(id, tx);
        tracing::debug!(connection_id = %id, "Relay connection registered");
        (id, rx)
    }

    /// Remove a connection from every room. Empty rooms are dropped.
    pub fn disconnect(&self, id: &ConnectionId) {
        let mut rooms = self.write();
        rooms.connections.remove(id);
        rooms.members.retain(|_, members| {
            members.remove(id);
            !members.is_empty()
        });
        tracing::debug!(connection_id = %id, "Relay connection removed");
    }

    /// Idempotent. Unknown connections are ignored.
    pub fn join(&self, id: &ConnectionId, room: &str) {
        let mut rooms = self.write();
        if !rooms.connections.contains_key(id) {
            return;
        }
        rooms.members.entry(room.to_string()).or_default().insert(*id);
    }

    /// Idempotent.
    pub fn leave(&self, id: &ConnectionId, room: &str) {
        let mut rooms = self.write();
        if let Some(members) = rooms.members.get_mut(room) {
            members.remove(id);
            if members.is_empty() {
                rooms.members.remove(room);
            }
        }
    }

    /// Push `event` to every member of `room` except `skip`.
    /// Returns how many members accepted the frame.
    pub fn broadcast(&self, room: &str, event: ServerEvent, skip: Option<&ConnectionId>) -> usize {
        let targets: Vec<(ConnectionId, mpsc::Sender<ServerEvent>)> = {
            let rooms = self.read();
            let Some(members) = rooms.members.get(room) else {
                return 0;
            };
            members
                .iter()
                .filter(|id| Some(*id) != skip)
                .filter_map(|id| rooms.connections.get(id).map(|tx| (*id, tx.clone())))
                .collect()
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(connection_id = %id, room, "Relay queue full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(id),
            }
        }
        for id in &closed {
            self.disconnect(id);
        }
        delivered
    }

    /// Apply one client frame on behalf of connection `id`.
    pub fn handle(&self, id: &ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::JoinConversation(room) => self.join(id, &room),
            ClientEvent::LeaveConversation(room) => self.leave(id, &room),
            ClientEvent::SendMessage(payload) => {
                self.broadcast(
                    &payload.conversation_id,
                    ServerEvent::ReceiveMessage(payload.message),
                    None,
                );
            }
            ClientEvent::Typing(payload) => {
                let room = payload.conversation_id.clone();
                self.broadcast(&room, ServerEvent::Typing(payload), Some(id));
            }
        }
    }

    pub fn member_count(&self, room: &str) -> usize {
        self.read().members.get(room).map(HashSet::len).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.read().members.len()
    }

    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn send(room: &str, body: &str) -> ClientEvent {
        ClientEvent::SendMessage(SendMessagePayload {
            conversation_id: room.into(),
            message: json!({ "content": body }),
        })
    }

    #[test]
    fn client_frames_parse_from_json() {
        let join: ClientEvent =
            serde_json::from_str(r#"{"event":"join_conversation","data":"c1"}"#).unwrap();
        assert_eq!(join, ClientEvent::JoinConversation("c1".into()));

        let typing: ClientEvent = serde_json::from_str(
            r#"{"event":"typing","data":{"conversationId":"c1","userId":"u1","isTyping":true}}"#,
        )
        .unwrap();
        assert!(matches!(typing, ClientEvent::Typing(TypingPayload { is_typing: true, .. })));

        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"explode","data":1}"#).is_err());
    }

    #[test]
    fn server_frames_serialize_with_event_and_data() {
        let frame = serde_json::to_value(ServerEvent::ReceiveMessage(json!({"content": "hi"}))).unwrap();
        assert_eq!(frame, json!({"event": "receive_message", "data": {"content": "hi"}}));

        let id = Uuid::new_v4();
        let frame = serde_json::to_value(ServerEvent::Connected(ConnectedPayload { connection_id: id }))
            .unwrap();
        assert_eq!(frame["data"]["connectionId"], id.to_string());
    }

    #[tokio::test]
    async fn message_reaches_room_members_only() {
        let hub = RoomHub::new();
        let (a, mut rx_a) = hub.connect();
        let (b, mut rx_b) = hub.connect();
        let (c, mut rx_c) = hub.connect();
        hub.join(&a, "room-1");
        hub.join(&b, "room-1");
        hub.join(&c, "room-2");

        hub.handle(&a, send("room-1", "hello"));

        let expected = ServerEvent::ReceiveMessage(json!({ "content": "hello" }));
        assert_eq!(rx_a.recv().await.unwrap(), expected);
        assert_eq!(rx_b.recv().await.unwrap(), expected);
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn typing_skips_sender() {
        let hub = RoomHub::new();
        let (a, mut rx_a) = hub.connect();
        let (b, mut rx_b) = hub.connect();
        hub.join(&a, "room");
        hub.join(&b, "room");

        hub.handle(
            &a,
            ClientEvent::Typing(TypingPayload {
                conversation_id: "room".into(),
                user_id: "u-a".into(),
                is_typing: true,
            }),
        );
        assert!(matches!(rx_b.recv().await.unwrap(), ServerEvent::Typing(_)));
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn join_and_leave_are_idempotent() {
        let hub = RoomHub::new();
        let (a, _rx) = hub.connect();
        hub.join(&a, "room");
        hub.join(&a, "room");
        assert_eq!(hub.member_count("room"), 1);

        hub.leave(&a, "room");
        hub.leave(&a, "room");
        assert_eq!(hub.member_count("room"), 0);
        assert_eq!(hub.room_count(), 0);
    }

    #[test]
    fn disconnect_drops_empty_rooms() {
        let hub = RoomHub::new();
        let (a, _rx_a) = hub.connect();
        let (b, _rx_b) = hub.connect();
        hub.join(&a, "shared");
        hub.join(&b, "shared");
        hub.join(&a, "solo");

        hub.disconnect(&a);
        assert_eq!(hub.member_count("shared"), 1);
        assert_eq!(hub.member_count("solo"), 0);
        assert_eq!(hub.room_count(), 1);
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn full_queue_drops_frame_for_that_member_only() {
        let hub = RoomHub::new();
        let (slow, _rx_slow) = hub.connect();
        let (fast, mut rx_fast) = hub.connect();
        hub.join(&slow, "room");
        hub.join(&fast, "room");

        for i in 0..CONNECTION_QUEUE_CAPACITY {
            hub.broadcast("room", ServerEvent::ReceiveMessage(json!(i)), None);
            assert!(rx_fast.try_recv().is_ok());
        }
        let delivered = hub.broadcast("room", ServerEvent::ReceiveMessage(json!("overflow")), None);
        assert_eq!(delivered, 1);
        assert_eq!(hub.member_count("room"), 2);
    }

    #[test]
    fn closed_receivers_are_pruned() {
        let hub = RoomHub::new();
        let (gone, rx_gone) = hub.connect();
        let (_stays, _rx) = hub.connect();
        hub.join(&gone, "room");
        drop(rx_gone);

        assert_eq!(hub.broadcast("room", ServerEvent::ReceiveMessage(json!(1)), None), 0);
        assert_eq!(hub.member_count("room"), 0);
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn join_from_unknown_connection_ignored() {
        let hub = RoomHub::new();
        hub.join(&Uuid::new_v4(), "room");
        assert_eq!(hub.room_count(), 0);
    }
}
