//! Read-only conversation queries derived from the store.
//!
//! Summaries are recomputed on every query; there is no caching layer and
//! no dependency on live connection state.

use rusqlite::OptionalExtension;
use serde::Serialize;

use crate::db::DbPool;
use crate::store::{self, StoreError};

/// Per-contact summary for the conversation list.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub username: String,
    pub name: String,
    pub last_message: Option<String>,
    pub last_message_timestamp: Option<String>,
    pub unread_count: i64,
}

/// All conversations for `username`, newest activity first. A contact whose
/// user record no longer resolves is dropped with a warning, not an error.
pub fn list_conversations(
    db: &DbPool,
    username: &str,
) -> Result<Vec<ConversationSummary>, StoreError> {
    let contacts = contacts_of(db, username)?;

    let mut summaries = Vec::with_capacity(contacts.len());
    for contact in contacts {
        if let Some(summary) = conversation_with(db, username, &contact)? {
            summaries.push(summary);
        }
    }

    // Newest contact first; conversations with no messages sort last
    // (Option: None orders before Some, so reverse comparison puts it last).
    summaries.sort_by(|a, b| b.last_message_timestamp.cmp(&a.last_message_timestamp));

    Ok(summaries)
}

/// Summary of the conversation between `username` and one contact:
/// last message (timestamp descending, id descending as tie-break) and
/// count of unread messages from the contact.
pub fn conversation_with(
    db: &DbPool,
    username: &str,
    contact: &str,
) -> Result<Option<ConversationSummary>, StoreError> {
    let Some(contact_user) = store::find_user_by_username(db, contact)? else {
        tracing::warn!(
            username,
            contact,
            "contact has no user record, dropping from conversation list"
        );
        return Ok(None);
    };

    let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;

    let last: Option<(String, String)> = conn
        .query_row(
            "SELECT text, timestamp FROM messages
             WHERE (sender = ?1 AND recipient = ?2) OR (sender = ?2 AND recipient = ?1)
             ORDER BY timestamp DESC, id DESC
             LIMIT 1",
            rusqlite::params![username, contact],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let unread_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages
         WHERE sender = ?1 AND recipient = ?2 AND is_read = 0",
        rusqlite::params![contact, username],
        |row| row.get(0),
    )?;

    let (last_message, last_message_timestamp) = match last {
        Some((text, timestamp)) => (Some(text), Some(timestamp)),
        None => (None, None),
    };

    Ok(Some(ConversationSummary {
        username: contact_user.username,
        name: contact_user.display_name,
        last_message,
        last_message_timestamp,
        unread_count,
    }))
}

/// Distinct contacts of `username`: union of everyone they sent to and
/// everyone who sent to them.
fn contacts_of(db: &DbPool, username: &str) -> Result<Vec<String>, StoreError> {
    let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
    let mut stmt = conn.prepare(
        "SELECT DISTINCT recipient AS contact FROM messages WHERE sender = ?1
         UNION
         SELECT DISTINCT sender AS contact FROM messages WHERE recipient = ?1",
    )?;
    let contacts = stmt
        .query_map([username], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(contacts)
}
