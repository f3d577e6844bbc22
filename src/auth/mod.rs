pub mod jwt;
pub mod middleware;
pub mod password;

use crate::db::models::User;
use crate::db::DbPool;
use crate::store::{self, StoreError};

/// Verify a username/password pair against the stored bcrypt hash.
/// Returns the user record on success, None on unknown user or bad password.
pub fn verify_credentials(
    db: &DbPool,
    username: &str,
    plain_password: &str,
) -> Result<Option<User>, StoreError> {
    let Some(user) = store::find_user_by_username(db, username)? else {
        return Ok(None);
    };
    if password::verify_password(plain_password, &user.password_hash) {
        Ok(Some(user))
    } else {
        tracing::warn!(username, "password verification failed");
        Ok(None)
    }
}
