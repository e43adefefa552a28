use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::error::{AppError, AppResult};
use crate::state::DbPool;

/// Create a new session for a user. Returns the session token.
///
/// Any existing sessions for the user are dropped first: one active
/// session per user. Two racing logins leave whichever wrote last.
pub fn create_session(pool: &DbPool, user_id: i64, hours: u64) -> AppResult<String> {
    let conn = pool.get()?;
    let token = generate_token();

    conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
    conn.execute(
        "INSERT INTO sessions (user_id, token, expires_at) VALUES (?1, ?2, datetime('now', ?3))",
        params![user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Resolve a token to its user id.
///
/// Expiry is lazy: an expired row is deleted here, so a second lookup of
/// the same token reports `InvalidSession` rather than `SessionExpired`.
pub fn validate_session(pool: &DbPool, token: &str) -> AppResult<i64> {
    let conn = pool.get()?;

    let row: Option<(i64, bool)> = conn
        .query_row(
            "SELECT user_id, expires_at < datetime('now') FROM sessions WHERE token = ?1",
            params![token],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (user_id, expired) = row.ok_or(AppError::InvalidSession)?;

    if expired {
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        return Err(AppError::SessionExpired);
    }

    Ok(user_id)
}

/// Delete a session by token. Unknown tokens are not an error.
pub fn revoke_session(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
