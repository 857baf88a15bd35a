//! User accounts and login sessions
//!
//! Passwords are stored as SHA-256 over a per-user random salt plus the
//! password. Sessions are opaque UUID tokens with an absolute expiry.

use crate::db::models::{require_text, Role, User};
use crate::{ids, time, Error, Result};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 6;

/// Issued session token
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
    /// Unix seconds
    pub expires_at: i64,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    guid: String,
    username: String,
    role: String,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        Ok(User {
            id: ids::parse_stored(&self.guid)?,
            username: self.username,
            role: self.role.parse()?,
        })
    }
}

fn generate_salt() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Hex SHA-256 of salt followed by password
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Create an account; usernames are unique
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    role: Role,
) -> Result<User> {
    let username = username.trim();
    require_text("username", username)?;
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let taken: Option<String> = sqlx::query_scalar("SELECT guid FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    if taken.is_some() {
        return Err(Error::Conflict(format!("Username '{}' is already taken", username)));
    }

    let id = ids::generate();
    let salt = generate_salt();
    sqlx::query(
        "INSERT INTO users (guid, username, password_hash, password_salt, role) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(username)
    .bind(hash_password(&salt, password))
    .bind(&salt)
    .bind(role.as_str())
    .execute(pool)
    .await?;

    info!(user_id = %id, username, role = %role, "Created user");

    Ok(User { id, username: username.to_string(), role })
}

/// Check credentials; unknown user and wrong password are indistinguishable
pub async fn authenticate(pool: &SqlitePool, username: &str, password: &str) -> Result<User> {
    let row: Option<(String, String, String, String, String)> = sqlx::query_as(
        "SELECT guid, username, role, password_hash, password_salt FROM users WHERE username = ?",
    )
    .bind(username.trim())
    .fetch_optional(pool)
    .await?;

    let invalid = || Error::Unauthorized("Invalid username or password".to_string());

    let (guid, username, role, stored_hash, salt) = row.ok_or_else(invalid)?;
    if hash_password(&salt, password) != stored_hash {
        warn!(username = %username, "Failed login attempt");
        return Err(invalid());
    }

    UserRow { guid, username, role }.into_user()
}

pub async fn find_user(pool: &SqlitePool, id: Uuid) -> Result<User> {
    let row: Option<UserRow> =
        sqlx::query_as("SELECT guid, username, role FROM users WHERE guid = ?")
            .bind(id.to_string())
            .fetch_optional(pool)
            .await?;

    row.ok_or_else(|| Error::NotFound(format!("User {}", id)))?
        .into_user()
}

/// Issue a session token valid for `ttl_hours`
pub async fn create_session(pool: &SqlitePool, user: &User, ttl_hours: i64) -> Result<Session> {
    let token = ids::generate().to_string();
    let expires_at = time::expiry_from_now(ttl_hours);

    sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(user.id.to_string())
        .bind(expires_at)
        .execute(pool)
        .await?;

    info!(user_id = %user.id, username = %user.username, "Session started");

    Ok(Session { token, user: user.clone(), expires_at })
}

/// Look up the user behind a token; expired tokens are removed and rejected
pub async fn resolve_session(pool: &SqlitePool, token: &str) -> Result<User> {
    let row: Option<(String, String, String, i64)> = sqlx::query_as(
        r#"
        SELECT u.guid, u.username, u.role, s.expires_at
        FROM sessions s JOIN users u ON u.guid = s.user_id
        WHERE s.token = ?
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    let (guid, username, role, expires_at) =
        row.ok_or_else(|| Error::Unauthorized("Invalid session".to_string()))?;

    if expires_at <= time::now().timestamp() {
        revoke_session(pool, token).await?;
        return Err(Error::Unauthorized("Session expired".to_string()));
    }

    UserRow { guid, username, role }.into_user()
}

pub async fn revoke_session(pool: &SqlitePool, token: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Drop every expired session; returns the number removed
pub async fn purge_expired_sessions(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(time::now().timestamp())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_depends_on_salt() {
        let a = hash_password("aa", "secret");
        let b = hash_password("bb", "secret");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(a, hash_password("aa", "secret"));
    }

    #[test]
    fn test_salt_is_random_hex() {
        let s1 = generate_salt();
        let s2 = generate_salt();
        assert_eq!(s1.len(), 32);
        assert!(s1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(s1, s2);
    }
}
