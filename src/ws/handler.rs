use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::auth::jwt;
use crate::state::AppState;
use crate::store;
use crate::ws::actor;

/// Query parameters for WebSocket connection.
/// Auth is via query param ?token=JWT.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

/// GET /ws?token=JWT
/// WebSocket upgrade endpoint. Authenticates via query parameter.
/// On auth failure, upgrades then immediately closes with 1008 (policy
/// violation). On success, spawns an actor for the connection.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let username = match jwt::resolve_token(&state.jwt_secret, &params.token) {
        Some(username) => username,
        None => {
            tracing::warn!("WebSocket connection failed: invalid token");
            return ws.on_upgrade(close_policy_violation);
        }
    };

    // The token must also map to a user that still exists.
    let known_user = {
        let db = state.db.clone();
        let lookup = username.clone();
        tokio::task::spawn_blocking(move || store::find_user_by_username(&db, &lookup))
            .await
            .ok()
            .and_then(|result| result.ok())
            .flatten()
            .is_some()
    };
    if !known_user {
        tracing::warn!(username, "WebSocket connection failed: unknown user");
        return ws.on_upgrade(close_policy_violation);
    }

    tracing::info!(username, "WebSocket connection authenticated");
    ws.on_upgrade(move |socket| actor::run_connection(socket, state, username))
}

async fn close_policy_violation(mut socket: WebSocket) {
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: "invalid token".into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}
