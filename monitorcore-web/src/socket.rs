//! Websocket push socket.
//!
//! Every connection registers one sink in the shared broadcaster. The sink
//! forwards encoded messages to a per-connection writer, which also relays
//! fatal errors and watches for the client going away.
//!
//! Wire format, one JSON text frame per message:
//!
//! ```text
//! {"event": "system_update", "data": { ...snapshot... }}
//! {"event": "error", "data": {"message": "..."}}
//! ```

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use monitorcore::{DeliveryError, Snapshot, SnapshotSink};
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Event name for snapshot updates.
pub const SYSTEM_UPDATE: &str = "system_update";
/// Event name for fatal errors.
pub const ERROR: &str = "error";

/// Encoded messages waiting for the socket writer.
const OUTBOUND_CAPACITY: usize = 8;

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    event: &'a str,
    data: T,
}

/// Encode a snapshot as a `system_update` message.
pub fn encode_update(snapshot: &Snapshot) -> serde_json::Result<String> {
    serde_json::to_string(&Envelope {
        event: SYSTEM_UPDATE,
        data: snapshot,
    })
}

/// Encode a fatal error as an `error` message.
pub fn encode_error(message: &str) -> serde_json::Result<String> {
    serde_json::to_string(&Envelope {
        event: ERROR,
        data: json!({ "message": message }),
    })
}

/// Broadcaster sink for one websocket connection.
#[derive(Debug)]
pub struct SocketSink {
    outbound: mpsc::Sender<String>,
}

impl SocketSink {
    pub fn new(outbound: mpsc::Sender<String>) -> Self {
        Self { outbound }
    }
}

#[async_trait]
impl SnapshotSink for SocketSink {
    async fn deliver(&mut self, snapshot: Snapshot) -> Result<(), DeliveryError> {
        let text = encode_update(&snapshot).map_err(|e| DeliveryError::Failed(e.to_string()))?;
        self.outbound
            .send(text)
            .await
            .map_err(|_| DeliveryError::Disconnected)
    }
}

/// `GET /ws`
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut fatal = state.watch_fatal();

    // Replay a fatal error that happened before this client connected.
    let replay = fatal.borrow_and_update().clone();
    if let Some(message) = replay {
        if send_error(&mut sender, &message).await.is_err() {
            return;
        }
    }

    let (outbound_tx, mut outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let id = state.broadcaster().register("websocket", SocketSink::new(outbound_tx));
    info!(subscriber = %id, "dashboard client connected");

    loop {
        tokio::select! {
            text = outbound_rx.recv() => {
                // The broadcaster dropped the sink: closed or shutting down.
                let Some(text) = text else { break };
                if let Err(e) = sender.send(Message::Text(text.into())).await {
                    debug!(subscriber = %id, error = %e, "websocket send failed");
                    break;
                }
            }
            changed = fatal.changed() => {
                if changed.is_err() {
                    continue;
                }
                let message = fatal.borrow_and_update().clone();
                if let Some(message) = message {
                    if send_error(&mut sender, &message).await.is_err() {
                        break;
                    }
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(subscriber = %id, error = %e, "websocket receive failed");
                        break;
                    }
                }
            }
        }
    }

    state.broadcaster().unregister(id);
    info!(subscriber = %id, "dashboard client disconnected");
}

async fn send_error<S>(sender: &mut S, message: &str) -> Result<(), ()>
where
    S: futures_util::Sink<Message> + Unpin,
{
    let text = match encode_error(message) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to encode error event");
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_update_envelope() {
        let snapshot = Snapshot::decode(r#"{"cpu":{"usage":12.5}}"#).unwrap();
        let text = encode_update(&snapshot).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"event": "system_update", "data": {"cpu": {"usage": 12.5}}})
        );
    }

    #[test]
    fn test_error_envelope() {
        let value: Value = serde_json::from_str(&encode_error("no monitor").unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"event": "error", "data": {"message": "no monitor"}})
        );
    }

    #[tokio::test]
    async fn test_sink_forwards_encoded_updates() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut sink = SocketSink::new(tx);
        sink.deliver(Snapshot::decode(r#"{"a":1}"#).unwrap()).await.unwrap();

        let text = rx.recv().await.unwrap();
        assert!(text.starts_with(r#"{"event":"system_update""#));

        drop(rx);
        let err = sink
            .deliver(Snapshot::decode(r#"{"a":2}"#).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::Disconnected);
    }
}
