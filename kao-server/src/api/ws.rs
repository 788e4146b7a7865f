//! `GET /ws` — overlay client connection.
//!
//! Upgrades to a WebSocket, registers the client with the hub, then
//! drives the connection: hub fan-out messages flow out, subscribe/
//! unsubscribe control frames flow in. A malformed control frame is
//! logged and ignored; the connection stays open. The client is removed
//! from the hub on close or transport error.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use kao_proto::{ControlFrame, WireMessage};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;

/// Per-client outbound buffer. Slow clients that fall this far behind
/// start dropping frames rather than backpressuring the hub.
const OUTBOUND_BUFFER: usize = 64;

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<WireMessage>(OUTBOUND_BUFFER);
    let client_id = state.hub.register(outbound_tx).await;

    loop {
        tokio::select! {
            maybe = outbound_rx.recv() => match maybe {
                Some(message) => {
                    let json = match serde_json::to_string(&message) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!(%client_id, error = %e, "failed to serialize frame");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },

            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_control_frame(&state, client_id, &text).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {
                    // Ping/pong handled by axum, binary frames ignored.
                }
                Some(Err(e)) => {
                    tracing::debug!(%client_id, error = %e, "websocket transport error");
                    break;
                }
            }
        }
    }

    state.hub.remove(client_id).await;
}

async fn handle_control_frame(state: &AppState, client_id: Uuid, text: &str) {
    match serde_json::from_str::<ControlFrame>(text) {
        Ok(ControlFrame::Subscribe(payload)) => {
            state.hub.subscribe(client_id, &payload).await;
        }
        Ok(ControlFrame::Unsubscribe(payload)) => {
            state.hub.unsubscribe(client_id, &payload).await;
        }
        Err(e) => {
            tracing::warn!(%client_id, error = %e, "malformed control frame ignored");
        }
    }
}
