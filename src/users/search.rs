//! User lookup endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::db::models::UserProfile;
use crate::state::AppState;
use crate::store;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Substring matched against username and display name
    #[serde(default)]
    pub username: String,
}

/// GET /users/search?username=q — Case-insensitive substring search.
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserProfile>>, StatusCode> {
    let db = state.db.clone();

    let users = tokio::task::spawn_blocking(move || store::search_users(&db, &query.username))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|err| {
            tracing::error!(error = %err, "user search failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// GET /users/{username} — Public profile for one user.
pub async fn get_user_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserProfile>, StatusCode> {
    let db = state.db.clone();

    let user = tokio::task::spawn_blocking(move || store::find_user_by_username(&db, &username))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|err| {
            tracing::error!(error = %err, "user lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    match user {
        Some(user) => Ok(Json(user.into())),
        None => Err(StatusCode::NOT_FOUND),
    }
}
