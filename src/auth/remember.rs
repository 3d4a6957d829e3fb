use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::auth::session::generate_token;
use crate::db::RepositoryError;
use crate::state::DbPool;

/// Server-side store for long-lived "remember me" tokens.
///
/// Only a SHA-256 digest of each token is persisted, so a leaked table cannot
/// be replayed as cookies.
#[derive(Clone)]
pub struct RememberTokens {
    pool: DbPool,
    lifetime: Duration,
}

impl RememberTokens {
    pub fn new(pool: DbPool, lifetime_days: i64) -> Self {
        Self {
            pool,
            lifetime: Duration::days(lifetime_days),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a token for the user. The plaintext goes into the cookie.
    pub fn issue(&self, user_id: &str, now: DateTime<Utc>) -> Result<String, RepositoryError> {
        let token = generate_token();
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO remember_tokens (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![
                digest(&token),
                user_id,
                (now + self.lifetime).to_rfc3339()
            ],
        )?;
        tracing::info!(user_id, "issued remember-me token");
        Ok(token)
    }

    /// Resolve a token to its user if it is neither expired nor revoked.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Option<String>, RepositoryError> {
        if token.is_empty() {
            return Ok(None);
        }
        let conn = self.pool.get()?;
        let row: Option<(String, String, Option<String>)> = conn
            .query_row(
                "SELECT user_id, expires_at, revoked_at FROM remember_tokens WHERE token_hash = ?1",
                params![digest(token)],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((user_id, expires_at, revoked_at)) = row else {
            return Ok(None);
        };
        if revoked_at.is_some() {
            return Ok(None);
        }
        let expired = DateTime::parse_from_rfc3339(&expires_at)
            .map(|dt| dt.with_timezone(&Utc) <= now)
            .unwrap_or(true);
        if expired {
            return Ok(None);
        }
        Ok(Some(user_id))
    }

    /// Revoke one token. Returns whether a live token was revoked.
    pub fn revoke(&self, token: &str, now: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE remember_tokens SET revoked_at = ?1 WHERE token_hash = ?2 AND revoked_at IS NULL",
            params![now.to_rfc3339(), digest(token)],
        )?;
        Ok(rows > 0)
    }

    /// Validate, revoke, and reissue in one step. Only the caller whose
    /// revoke actually flipped the row gets a fresh token.
    pub fn rotate(&self, token: &str, now: DateTime<Utc>) -> Result<Option<(String, String)>, RepositoryError> {
        let Some(user_id) = self.validate(token, now)? else {
            return Ok(None);
        };
        if !self.revoke(token, now)? {
            tracing::warn!(user_id, "remember-me token already exchanged");
            return Ok(None);
        }
        let fresh = self.issue(&user_id, now)?;
        Ok(Some((user_id, fresh)))
    }
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
