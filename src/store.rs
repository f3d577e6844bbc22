//! Durable storage operations over the shared SQLite connection.
//!
//! Everything here is synchronous and expected to run under
//! `tokio::task::spawn_blocking` when called from async handlers.
//! Message ids are assigned by SQLite (AUTOINCREMENT) and are strictly
//! increasing, standing in as the authoritative delivery order.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;

use crate::db::models::{Message, User};
use crate::db::DbPool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username '{0}' is already registered")]
    DuplicateUsername(String),
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

fn user_from_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        username: row.get(0)?,
        display_name: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn message_from_row(row: &Row) -> Result<Message, rusqlite::Error> {
    Ok(Message {
        id: row.get(0)?,
        sender: row.get(1)?,
        recipient: row.get(2)?,
        text: row.get(3)?,
        timestamp: row.get(4)?,
        is_read: row.get(5)?,
    })
}

const USER_COLUMNS: &str = "username, display_name, password_hash, created_at";
const MESSAGE_COLUMNS: &str = "id, sender, recipient, text, timestamp, is_read";

fn lock(db: &DbPool) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
    db.lock().map_err(|_| StoreError::LockPoisoned)
}

/// Create a user. Fails with DuplicateUsername if the username is taken.
pub fn create_user(
    db: &DbPool,
    username: &str,
    display_name: &str,
    password_hash: &str,
) -> Result<User, StoreError> {
    let conn = lock(db)?;

    let taken: Option<String> = conn
        .query_row(
            "SELECT username FROM users WHERE username = ?1",
            [username],
            |row| row.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(StoreError::DuplicateUsername(username.to_string()));
    }

    let created_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO users (username, display_name, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![username, display_name, password_hash, created_at],
    )?;

    tracing::info!(username, "user created");

    Ok(User {
        username: username.to_string(),
        display_name: display_name.to_string(),
        password_hash: password_hash.to_string(),
        created_at,
    })
}

pub fn find_user_by_username(db: &DbPool, username: &str) -> Result<Option<User>, StoreError> {
    let conn = lock(db)?;
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            [username],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Case-insensitive substring search over username and display name.
/// An empty query matches nothing.
pub fn search_users(db: &DbPool, query: &str) -> Result<Vec<User>, StoreError> {
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let conn = lock(db)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE username LIKE '%' || ?1 || '%' OR display_name LIKE '%' || ?1 || '%'
         ORDER BY username",
    ))?;
    let users = stmt
        .query_map([query], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Persist a message, assigning its id and creation timestamp.
/// Referential integrity of sender/recipient is the caller's concern.
pub fn create_message(
    db: &DbPool,
    sender: &str,
    recipient: &str,
    text: &str,
) -> Result<Message, StoreError> {
    let conn = lock(db)?;
    let timestamp = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO messages (sender, recipient, text, timestamp, is_read) VALUES (?1, ?2, ?3, ?4, 0)",
        params![sender, recipient, text, timestamp],
    )?;
    let id = conn.last_insert_rowid();

    tracing::debug!(id, sender, recipient, "message persisted");

    Ok(Message {
        id,
        sender: sender.to_string(),
        recipient: recipient.to_string(),
        text: text.to_string(),
        timestamp,
        is_read: false,
    })
}

/// All messages between two users in either direction, ascending by
/// timestamp with id as tie-break.
pub fn find_messages_between(
    db: &DbPool,
    user_a: &str,
    user_b: &str,
) -> Result<Vec<Message>, StoreError> {
    let conn = lock(db)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE (sender = ?1 AND recipient = ?2) OR (sender = ?2 AND recipient = ?1)
         ORDER BY timestamp ASC, id ASC",
    ))?;
    let messages = stmt
        .query_map(params![user_a, user_b], message_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(messages)
}

/// Mark one message as read. Idempotent — marking an already-read message
/// succeeds without changing state. Returns None if the id is unknown.
pub fn set_message_read(db: &DbPool, message_id: i64) -> Result<Option<Message>, StoreError> {
    let conn = lock(db)?;
    let updated = conn.execute("UPDATE messages SET is_read = 1 WHERE id = ?1", [message_id])?;
    if updated == 0 {
        return Ok(None);
    }
    let message = conn
        .query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
            [message_id],
            message_from_row,
        )
        .optional()?;
    Ok(message)
}

/// Bulk-mark every unread message from `sender` to `recipient` as read.
/// No-op if none match. Returns the number of rows updated.
pub fn set_all_read_between(
    db: &DbPool,
    sender: &str,
    recipient: &str,
) -> Result<usize, StoreError> {
    let conn = lock(db)?;
    let updated = conn.execute(
        "UPDATE messages SET is_read = 1 WHERE sender = ?1 AND recipient = ?2 AND is_read = 0",
        params![sender, recipient],
    )?;
    if updated > 0 {
        tracing::info!(sender, recipient, updated, "messages marked read");
    }
    Ok(updated)
}
