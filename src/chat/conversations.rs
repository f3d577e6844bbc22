//! REST endpoints for conversation listing, history, and read-marking.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::middleware::Claims;
use crate::chat::view::{self, ConversationSummary};
use crate::db::models::Message;
use crate::state::AppState;
use crate::store;

/// GET /conversations — List conversation summaries for the authenticated
/// user, newest activity first.
pub async fn list_conversations(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<ConversationSummary>>, StatusCode> {
    let db = state.db.clone();
    let username = claims.sub;

    let summaries = tokio::task::spawn_blocking(move || view::list_conversations(&db, &username))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|err| {
            tracing::error!(error = %err, "failed to list conversations");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(summaries))
}

/// GET /conversations/{contact}/messages — Full message history between the
/// authenticated user and a contact, ascending by timestamp (id tie-break).
pub async fn get_history(
    State(state): State<AppState>,
    claims: Claims,
    Path(contact): Path<String>,
) -> Result<Json<Vec<Message>>, StatusCode> {
    let db = state.db.clone();
    let username = claims.sub;

    let messages =
        tokio::task::spawn_blocking(move || store::find_messages_between(&db, &username, &contact))
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .map_err(|err| {
                tracing::error!(error = %err, "failed to fetch message history");
                StatusCode::INTERNAL_SERVER_ERROR
            })?;

    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub struct ReadReceipt {
    pub message_id: i64,
}

/// POST /messages/read — Mark one message as read (idempotent), then return
/// the refreshed summary of the conversation with that message's sender.
pub async fn mark_message_read(
    State(state): State<AppState>,
    claims: Claims,
    Json(receipt): Json<ReadReceipt>,
) -> Result<Json<ConversationSummary>, StatusCode> {
    let db = state.db.clone();
    let username = claims.sub;

    let summary = tokio::task::spawn_blocking(move || {
        let message = store::set_message_read(&db, receipt.message_id)?;
        let Some(message) = message else {
            return Ok(None);
        };
        view::conversation_with(&db, &username, &message.sender)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    .map_err(|err| {
        tracing::error!(error = %err, "failed to mark message read");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match summary {
        Some(summary) => Ok(Json(summary)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// POST /conversations/{contact}/read — Bulk-mark all messages from the
/// contact to the authenticated user as read. No-op if none are unread.
pub async fn mark_all_read(
    State(state): State<AppState>,
    claims: Claims,
    Path(contact): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let db = state.db.clone();
    let username = claims.sub;

    tokio::task::spawn_blocking(move || store::set_all_read_between(&db, &contact, &username))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|err| {
            tracing::error!(error = %err, "failed to mark conversation read");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(StatusCode::NO_CONTENT)
}
