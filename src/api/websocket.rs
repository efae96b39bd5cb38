//! WebSocket transport for the chat relay.
//!
//! Connection lifecycle:
//! 1. Client opens `GET /ws`; the socket registers with the `RoomHub`
//! 2. Server sends `connected` with the connection id
//! 3. Client frames (`join_conversation`, `leave_conversation`,
//!    `send_message`, `typing`) are applied to the hub
//! 4. On close the connection leaves every room

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

use crate::api::types::ApiContext;
use crate::relay::{ClientEvent, ConnectedPayload, RoomHub, ServerEvent};

/// WebSocket upgrade handler.
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(ctx): State<ApiContext>) -> impl IntoResponse {
    let relay = ctx.core.relay().clone();
    ws.on_upgrade(move |socket| handle_ws(socket, relay))
}

/// Main connection handler.
///
/// Spawns a sender task for queue→WS forwarding, then runs the receive
/// loop until the client goes away.
async fn handle_ws(socket: WebSocket, relay: RoomHub) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (connection_id, mut rx) = relay.connect();
    tracing::info!(connection_id = %connection_id, "WebSocket connected");

    let hello = ServerEvent::Connected(ConnectedPayload { connection_id });
    if let Ok(json) = serde_json::to_string(&hello) {
        if ws_sink.send(Message::Text(json)).await.is_err() {
            relay.disconnect(&connection_id);
            return;
        }
    }

    // Spawn sender task (reads from the relay queue, writes to WebSocket)
    let sender_handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(j) => j,
                Err(_) => continue,
            };
            if ws_sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    while let Some(msg) = ws_stream.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => relay.handle(&connection_id, event),
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Ignoring malformed frame");
                }
            },
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {} // Ping/Pong handled by axum/tungstenite
        }
    }

    // Dropping the hub's sender ends the queue, which stops the sender task.
    relay.disconnect(&connection_id);
    let _ = sender_handle.await;

    tracing::info!(connection_id = %connection_id, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite;

    use crate::api::router::api_router_with_ctx;
    use crate::api::types::ApiContext;
    use crate::core_state::CoreState;
    use crate::doctor_directory::DoctorResolver;

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Start a test server and return the WS URL, the core and the guards.
    async fn setup_ws_server() -> (
        String,
        Arc<CoreState>,
        tokio::task::JoinHandle<()>,
        tempfile::TempDir,
    ) {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("medthread.db");
        crate::db::open_database(&db_path).unwrap();
        let core = Arc::new(CoreState::new(db_path, DoctorResolver::new(Vec::new())));

        let app = api_router_with_ctx(ApiContext::new(core.clone()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("ws://127.0.0.1:{}/ws", addr.port()), core, handle, tmp)
    }

    async fn next_json(ws: &mut Client) -> Value {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws error");
        match msg {
            tungstenite::Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    async fn send_json(ws: &mut Client, value: Value) {
        ws.send(tungstenite::Message::Text(value.to_string()))
            .await
            .unwrap();
    }

    /// Poll until the relay reports `expected` members in `room`.
    async fn wait_for_members(core: &CoreState, room: &str, expected: usize) {
        for _ in 0..100 {
            if core.relay().member_count(room) == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("room {room} never reached {expected} members");
    }

    async fn connect(url: &str) -> Client {
        let (mut ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .expect("WS connect failed");
        let hello = next_json(&mut ws).await;
        assert_eq!(hello["event"], "connected");
        assert!(hello["data"]["connectionId"].is_string());
        ws
    }

    #[tokio::test]
    async fn connect_receives_connected_event() {
        let (url, core, server, _tmp) = setup_ws_server().await;
        let _ws = connect(&url).await;
        assert_eq!(core.relay().connection_count(), 1);
        server.abort();
    }

    #[tokio::test]
    async fn message_reaches_every_room_member() {
        let (url, core, server, _tmp) = setup_ws_server().await;
        let mut alice = connect(&url).await;
        let mut bob = connect(&url).await;

        for ws in [&mut alice, &mut bob] {
            send_json(ws, json!({ "event": "join_conversation", "data": "c1" })).await;
        }
        wait_for_members(&core, "c1", 2).await;

        send_json(
            &mut alice,
            json!({
                "event": "send_message",
                "data": { "conversationId": "c1", "message": { "content": "hi" } }
            }),
        )
        .await;

        for ws in [&mut bob, &mut alice] {
            let frame = next_json(ws).await;
            assert_eq!(frame["event"], "receive_message");
            assert_eq!(frame["data"]["content"], "hi");
        }
        server.abort();
    }

    #[tokio::test]
    async fn typing_skips_the_sender() {
        let (url, core, server, _tmp) = setup_ws_server().await;
        let mut alice = connect(&url).await;
        let mut bob = connect(&url).await;

        for ws in [&mut alice, &mut bob] {
            send_json(ws, json!({ "event": "join_conversation", "data": "c2" })).await;
        }
        wait_for_members(&core, "c2", 2).await;

        send_json(
            &mut alice,
            json!({
                "event": "typing",
                "data": { "conversationId": "c2", "userId": "alice", "isTyping": true }
            }),
        )
        .await;

        let frame = next_json(&mut bob).await;
        assert_eq!(frame["event"], "typing");
        assert_eq!(frame["data"]["userId"], "alice");

        let nothing = tokio::time::timeout(Duration::from_millis(100), alice.next()).await;
        assert!(nothing.is_err(), "sender should not see its own typing event");
        server.abort();
    }

    #[tokio::test]
    async fn malformed_frame_keeps_connection_open() {
        let (url, core, server, _tmp) = setup_ws_server().await;
        let mut ws = connect(&url).await;

        ws.send(tungstenite::Message::Text("not json".into()))
            .await
            .unwrap();
        send_json(&mut ws, json!({ "event": "join_conversation", "data": "c3" })).await;
        wait_for_members(&core, "c3", 1).await;
        server.abort();
    }

    #[tokio::test]
    async fn close_removes_connection_from_rooms() {
        let (url, core, server, _tmp) = setup_ws_server().await;
        let mut ws = connect(&url).await;
        send_json(&mut ws, json!({ "event": "join_conversation", "data": "c4" })).await;
        wait_for_members(&core, "c4", 1).await;

        ws.close(None).await.unwrap();
        wait_for_members(&core, "c4", 0).await;
        assert_eq!(core.relay().room_count(), 0);
        server.abort();
    }
}
