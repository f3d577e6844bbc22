use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::chat::router::{self, RouteError};
use crate::state::AppState;
use crate::ws::protocol::InboundFrame;

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Prevents connection leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Write deadline for a single outbound frame. A peer that cannot accept a
/// frame within this window is torn down so it cannot stall fan-out.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards frames from an mpsc channel
/// - Reader task: processes incoming frames, dispatches to the router
///
/// The mpsc channel is what the connection registry hands out, so any part
/// of the system can push frames to this client without touching the socket.
pub async fn run_connection(socket: WebSocket, state: AppState, username: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Register in the connection registry. Last-connect-wins: any prior
    // connection for this username is closed and replaced.
    let epoch = match state.connections.connect(&username, tx.clone()) {
        Ok(epoch) => epoch,
        Err(err) => {
            tracing::warn!(username, error = %err, "connection registration rejected");
            return;
        }
    };

    tracing::info!(username, "WebSocket actor started");

    // Spawn writer task: forwards mpsc frames to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages in arrival order
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    handle_text_frame(&state, &username, text.as_str()).await;
                }
                Message::Binary(_) => {
                    // Protocol is JSON text; binary frames are dropped
                    tracing::debug!(username, "dropping unexpected binary frame");
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(username, reason = ?frame, "client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(username, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                tracing::info!(username, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks, then release the registry entry.
    // Epoch-guarded so a superseded actor does not evict its replacement.
    writer_handle.abort();
    ping_handle.abort();
    state.connections.disconnect_epoch(&username, epoch);

    tracing::info!(username, "WebSocket actor stopped");
}

/// Parse and route one inbound text frame. Malformed frames are dropped
/// silently (connection stays open); routing failures are logged and never
/// surfaced to the peer.
async fn handle_text_frame(state: &AppState, username: &str, text: &str) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(username, error = %err, "dropping malformed inbound frame");
            return;
        }
    };

    match router::route(state, username, &frame.recipient, &frame.text).await {
        Ok(message) => {
            tracing::debug!(
                username,
                recipient = %message.recipient,
                id = message.id,
                "message routed"
            );
        }
        Err(err @ (RouteError::EmptyPayload | RouteError::UnknownRecipient(_))) => {
            tracing::warn!(username, error = %err, "rejected inbound message");
        }
        Err(err) => {
            tracing::error!(username, error = %err, "failed to route inbound message");
        }
    }
}

/// Writer task: receives frames from the mpsc channel and forwards them to
/// the WebSocket sink under a write deadline.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        match timeout(WRITE_TIMEOUT, ws_sender.send(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                // WebSocket send failed — connection is broken
                break;
            }
            Err(_) => {
                tracing::warn!("write deadline exceeded, dropping connection");
                break;
            }
        }
    }
}
