//! Registration and login endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{self, jwt, password};
use crate::db::models::UserProfile;
use crate::state::AppState;
use crate::store::{self, StoreError};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    /// Display name shown to other users
    pub name: String,
    pub password: String,
}

/// POST /register — Create a new user account.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), (StatusCode, String)> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Username and password cannot be empty".to_string(),
        ));
    }

    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || {
        let password_hash = password::hash_password(&req.password)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        store::create_user(&db, &req.username, &req.name, &password_hash).map_err(|err| match err {
            StoreError::DuplicateUsername(_) => (StatusCode::CONFLICT, err.to_string()),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        })
    })
    .await
    .map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "registration task failed".to_string(),
        )
    })??;

    tracing::info!(username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub username: String,
    pub name: String,
}

/// POST /token — Verify credentials and issue an access token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, StatusCode> {
    let db = state.db.clone();
    let username = req.username.clone();

    let user = tokio::task::spawn_blocking(move || {
        auth::verify_credentials(&db, &req.username, &req.password)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    .map_err(|err| {
        tracing::error!(error = %err, "credential lookup failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let Some(user) = user else {
        tracing::warn!(username, "authentication failed");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let access_token = jwt::issue_token(&state.jwt_secret, &user.username)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    tracing::info!(username = %user.username, "user logged in");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        username: user.username,
        name: user.display_name,
    }))
}
