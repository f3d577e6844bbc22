//! Database row types. These correspond 1:1 to the SQLite schema
//! defined in migrations.rs.

use serde::Serialize;

/// User record in the users table.
/// `username` is the stable identity key; `password_hash` is a bcrypt hash
/// and never leaves the server.
#[derive(Debug, Clone)]
pub struct User {
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub created_at: String,
}

/// Public view of a user (what other users may see).
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub username: String,
    pub name: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            name: user.display_name,
        }
    }
}

/// Persisted direct message. `id` is assigned by SQLite (AUTOINCREMENT)
/// and is the authoritative ordering for history display when timestamps tie.
/// `timestamp` is RFC 3339 UTC, set once at creation.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: i64,
    pub sender: String,
    pub recipient: String,
    pub text: String,
    pub timestamp: String,
    pub is_read: bool,
}
