//! Maintainer authentication by bearer token
//!
//! # Architecture
//!
//! - Each maintainer holds one random token (64 hex characters)
//! - Only the SHA-256 digest of the token is stored
//! - Requests present the token as `Authorization: Bearer <token>`
//! - Lookup is by digest, so the plaintext never reaches the database

use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::info;

use crate::{Error, Result};

/// An authenticated maintainer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Maintainer {
    pub id: i64,
    pub username: String,
}

/// Generate a new random token
///
/// # Examples
///
/// ```
/// use flipfix_common::api::auth::generate_token;
///
/// let token = generate_token();
/// assert_eq!(token.len(), 64);
/// assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    to_hex(&bytes)
}

/// SHA-256 of a token as lowercase hex
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Create a maintainer and return it with its plaintext token
///
/// The token is not recoverable afterwards.
pub async fn create_maintainer(pool: &SqlitePool, username: &str) -> Result<(Maintainer, String)> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::InvalidInput("Username must not be empty".to_string()));
    }

    let token = generate_token();
    let result = sqlx::query("INSERT INTO maintainers (username, token_hash) VALUES (?, ?)")
        .bind(username)
        .bind(hash_token(&token))
        .execute(pool)
        .await?;

    info!("Created maintainer '{}'", username);

    Ok((
        Maintainer {
            id: result.last_insert_rowid(),
            username: username.to_string(),
        },
        token,
    ))
}

/// Resolve a presented token to its maintainer
pub async fn authenticate_maintainer(pool: &SqlitePool, token: &str) -> Result<Option<Maintainer>> {
    if token.is_empty() {
        return Ok(None);
    }

    let maintainer = sqlx::query_as::<_, Maintainer>(
        "SELECT id, username FROM maintainers WHERE token_hash = ?",
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await?;

    Ok(maintainer)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
