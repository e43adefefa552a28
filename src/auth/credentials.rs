use rusqlite::{params, OptionalExtension};

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

const MIN_PASSWORD_LEN: usize = 6;

/// Create a new account. Returns the new user's id.
///
/// All validation happens before any write: malformed fields and duplicate
/// email/username are rejected without touching the users table.
pub fn register(pool: &DbPool, email: &str, username: &str, password: &str) -> AppResult<i64> {
    let email = email.trim();
    let username = username.trim();

    if !is_valid_email(email) {
        return Err(AppError::InvalidInput("invalid email format".into()));
    }
    if username.is_empty() {
        return Err(AppError::InvalidInput("username cannot be empty".into()));
    }
    if username.contains(' ') {
        return Err(AppError::InvalidInput(
            "username cannot contain spaces".into(),
        ));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidInput(format!(
            "password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }

    let conn = pool.get()?;

    let email_taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        params![email],
        |row| row.get(0),
    )?;
    if email_taken {
        return Err(AppError::DuplicateEmail);
    }

    let username_taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        params![username],
        |row| row.get(0),
    )?;
    if username_taken {
        return Err(AppError::DuplicateUsername);
    }

    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    conn.execute(
        "INSERT INTO users (email, username, password_hash) VALUES (?1, ?2, ?3)",
        params![email, username, hash],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Check credentials and return the user's id.
///
/// Unknown email and wrong password report the same error so callers
/// cannot probe which addresses are registered.
pub fn authenticate(pool: &DbPool, email: &str, password: &str) -> AppResult<i64> {
    let conn = pool.get()?;

    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE email = ?1",
            params![email.trim()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (user_id, hash) = row.ok_or(AppError::InvalidCredentials)?;

    if !bcrypt::verify(password, &hash)? {
        return Err(AppError::InvalidCredentials);
    }

    Ok(user_id)
}

pub fn get_user(pool: &DbPool, user_id: i64) -> AppResult<User> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT id, email, username, password_hash, created_at FROM users WHERE id = ?1",
        params![user_id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                email: row.get(1)?,
                username: row.get(2)?,
                password_hash: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

/// Minimal syntactic check: one '@' with a non-empty local part and a
/// domain containing a dot, no whitespace anywhere.
fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    match domain.split_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[test]
    fn register_and_authenticate_round_trip() {
        let pool = test_pool();
        let id = register(&pool, "a@x.com", "alice", "secret1").unwrap();
        assert!(id > 0);

        let auth_id = authenticate(&pool, "a@x.com", "secret1").unwrap();
        assert_eq!(auth_id, id);
    }

    #[test]
    fn register_stores_hash_not_password() {
        let pool = test_pool();
        let id = register(&pool, "a@x.com", "alice", "secret1").unwrap();
        let user = get_user(&pool, id).unwrap();
        assert_ne!(user.password_hash, "secret1");
        assert!(bcrypt::verify("secret1", &user.password_hash).unwrap());
    }

    #[test]
    fn register_rejects_bad_input() {
        let pool = test_pool();
        assert!(matches!(
            register(&pool, "not-an-email", "alice", "secret1"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            register(&pool, "a@x.com", "", "secret1"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            register(&pool, "a@x.com", "al ice", "secret1"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            register(&pool, "a@x.com", "alice", "short"),
            Err(AppError::InvalidInput(_))
        ));

        // Nothing was written
        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn duplicate_email_and_username_rejected() {
        let pool = test_pool();
        register(&pool, "a@x.com", "alice", "secret1").unwrap();

        assert!(matches!(
            register(&pool, "a@x.com", "bob", "secret1"),
            Err(AppError::DuplicateEmail)
        ));
        assert!(matches!(
            register(&pool, "b@x.com", "alice", "secret1"),
            Err(AppError::DuplicateUsername)
        ));
    }

    #[test]
    fn authenticate_is_uniform_on_failure() {
        let pool = test_pool();
        register(&pool, "a@x.com", "alice", "secret1").unwrap();

        assert!(matches!(
            authenticate(&pool, "missing@x.com", "secret1"),
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&pool, "a@x.com", "wrong-password"),
            Err(AppError::InvalidCredentials)
        ));
    }

    #[test]
    fn get_user_missing_is_not_found() {
        let pool = test_pool();
        assert!(matches!(get_user(&pool, 42), Err(AppError::NotFound)));
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a@.com"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("no-at-sign.com"));
    }
}
