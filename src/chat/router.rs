//! Message routing: validate, persist, then fan out to live connections.
//!
//! Persistence is the success criterion; live delivery is best-effort and
//! never escalates. An offline recipient sees the message as history on
//! their next query.

use axum::extract::ws::Message as WsMessage;
use thiserror::Error;

use crate::db::models::Message;
use crate::state::AppState;
use crate::store::{self, StoreError};
use crate::ws::protocol::OutboundFrame;
use crate::ws::SendOutcome;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("message text and recipient must both be non-empty")]
    EmptyPayload,
    #[error("recipient '{0}' is not a known user")]
    UnknownRecipient(String),
    #[error("failed to persist message: {0}")]
    Store(#[from] StoreError),
    #[error("persistence task failed")]
    TaskFailed,
}

/// Route one inbound message: validate, persist via the store, then push
/// the full persisted record to both recipient and sender (the latter so
/// the sender's own live session reflects the sent message).
///
/// The sender is the already-authenticated identity of the inbound
/// connection and is not re-validated here.
pub async fn route(
    state: &AppState,
    sender: &str,
    recipient: &str,
    text: &str,
) -> Result<Message, RouteError> {
    if text.is_empty() || recipient.is_empty() {
        return Err(RouteError::EmptyPayload);
    }

    // Persist under spawn_blocking; no registry state is held here.
    let message = {
        let db = state.db.clone();
        let sender = sender.to_string();
        let recipient = recipient.to_string();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || {
            if store::find_user_by_username(&db, &recipient)?.is_none() {
                return Err(RouteError::UnknownRecipient(recipient));
            }
            Ok(store::create_message(&db, &sender, &recipient, &text)?)
        })
        .await
        .map_err(|_| RouteError::TaskFailed)??
    };

    // Fan-out. Delivery outcome never affects the result of route():
    // persistence already succeeded.
    if let Some(payload) = OutboundFrame::Message(message.clone()).to_json() {
        for target in [recipient, sender] {
            deliver(state, target, &payload);
        }
    }

    Ok(message)
}

fn deliver(state: &AppState, target: &str, payload: &str) {
    match state
        .connections
        .send(target, WsMessage::Text(payload.to_string().into()))
    {
        SendOutcome::Delivered => {
            tracing::debug!(target, "message delivered");
        }
        SendOutcome::NotConnected => {
            // Normal steady state for offline users
            tracing::debug!(target, "recipient not connected, message waits in store");
        }
        SendOutcome::SendFailed => {
            tracing::warn!(target, "live delivery failed, connection evicted");
        }
    }
}
