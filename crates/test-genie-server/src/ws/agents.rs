//! WebSocket fan-out of agent lifecycle events.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use test_genie_core::events::{EventFilter, EventPayload, ExecutionEvent};

use crate::AppState;

const MAX_CLIENT_FRAME: usize = 16 * 1024;

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Ping,
}

/// Keeps the connected-client count in step with live sockets
struct ClientGuard(Arc<AtomicUsize>);

impl ClientGuard {
    fn register(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(counter))
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn parse_client_message(text: &str) -> Option<ClientMessage> {
    if text.len() > MAX_CLIENT_FRAME {
        return None;
    }
    serde_json::from_str(text).ok()
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ClientGuard::register(&state.ws_clients);
    let (mut ws_sink, mut ws_stream) = socket.split();
    let mut events = state.bus.subscribe(EventFilter::Agents);
    let client_id = events.id();

    let connected = ExecutionEvent::new(EventPayload::Connected {}, state.clock.now(), 0);
    if ws_sink.send(Message::Text(connected.to_json())).await.is_err() {
        return;
    }
    tracing::debug!(client_id, "WebSocket client connected");

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if ws_sink.send(Message::Text(event.to_json())).await.is_err() {
                    tracing::debug!(client_id, "WebSocket write failed, dropping client");
                    break;
                }
            }
            incoming = ws_stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if parse_client_message(&text) == Some(ClientMessage::Ping) {
                            let pong = serde_json::json!({
                                "type": "pong",
                                "timestamp": state.clock.now(),
                            });
                            if ws_sink.send(Message::Text(pong.to_string())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(client_id, error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }

    tracing::debug!(client_id, "WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_frames_parse() {
        assert_eq!(parse_client_message(r#"{"type":"ping"}"#), Some(ClientMessage::Ping));
        assert_eq!(parse_client_message(r#"{"type":"subscribe"}"#), None);
        assert_eq!(parse_client_message("not json"), None);
    }

    #[test]
    fn oversized_frames_are_ignored() {
        let padded = format!(
            r#"{{"type":"ping","pad":"{}"}}"#,
            "x".repeat(MAX_CLIENT_FRAME)
        );
        assert_eq!(parse_client_message(&padded), None);
    }

    #[test]
    fn guard_tracks_client_count() {
        let counter = Arc::new(AtomicUsize::new(0));
        let first = ClientGuard::register(&counter);
        let second = ClientGuard::register(&counter);
        assert_eq!(counter.load(Ordering::Relaxed), 2);
        drop(first);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
        drop(second);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }
}
