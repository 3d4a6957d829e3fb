use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::db::RepositoryError;
use crate::state::DbPool;

/// A live server-side session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token: String,
}

/// Create a new session for a user.
pub fn create_session(pool: &DbPool, user_id: &str, hours: u64) -> Result<Session, RepositoryError> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(Session {
        id,
        user_id: user_id.to_string(),
        token,
    })
}

/// Look up an unexpired session by its cookie token.
pub fn find_session(pool: &DbPool, token: &str) -> Result<Option<Session>, RepositoryError> {
    let conn = pool.get()?;
    let session = conn
        .query_row(
            "SELECT id, user_id, token FROM sessions WHERE token = ?1 AND expires_at > datetime('now')",
            params![token],
            |row| {
                Ok(Session {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    token: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(session)
}

/// Delete a session by token. Its stored values go with it.
pub fn delete_session(pool: &DbPool, token: &str) -> Result<(), RepositoryError> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Key/value storage scoped to one session.
///
/// Handlers receive this explicitly through the request context instead of
/// reaching into ambient state.
#[derive(Clone)]
pub struct SessionStore {
    pool: DbPool,
    session_id: String,
}

impl SessionStore {
    pub fn new(pool: DbPool, session_id: impl Into<String>) -> Self {
        Self {
            pool,
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let conn = self.pool.get()?;
        let value = conn
            .query_row(
                "SELECT value FROM session_values WHERE session_id = ?1 AND key = ?2",
                params![self.session_id, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO session_values (session_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id, key) DO UPDATE SET value = excluded.value",
            params![self.session_id, key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "DELETE FROM session_values WHERE session_id = ?1 AND key = ?2",
            params![self.session_id, key],
        )?;
        Ok(())
    }
}

/// Generate a cryptographically random 32-byte hex token.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{insert_user, test_db};

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn sessions_can_be_found_then_deleted() {
        let (pool, _tmp) = test_db();
        let user = insert_user(&pool, "alice", "user");

        let session = create_session(&pool, &user, 1).unwrap();
        let found = find_session(&pool, &session.token).unwrap().unwrap();
        assert_eq!(found.user_id, user);

        delete_session(&pool, &session.token).unwrap();
        assert!(find_session(&pool, &session.token).unwrap().is_none());
    }

    #[test]
    fn expired_sessions_are_ignored() {
        let (pool, _tmp) = test_db();
        let user = insert_user(&pool, "bob", "user");
        let session = create_session(&pool, &user, 1).unwrap();

        pool.get()
            .unwrap()
            .execute(
                "UPDATE sessions SET expires_at = datetime('now', '-1 hours') WHERE id = ?1",
                params![session.id],
            )
            .unwrap();

        assert!(find_session(&pool, &session.token).unwrap().is_none());
    }

    #[test]
    fn session_store_round_trips_values() {
        let (pool, _tmp) = test_db();
        let user = insert_user(&pool, "carol", "user");
        let session = create_session(&pool, &user, 1).unwrap();
        let store = SessionStore::new(pool.clone(), &session.id);

        assert_eq!(store.get("flash").unwrap(), None);
        store.set("flash", "saved").unwrap();
        store.set("flash", "saved again").unwrap();
        assert_eq!(store.get("flash").unwrap().as_deref(), Some("saved again"));
        store.remove("flash").unwrap();
        assert_eq!(store.get("flash").unwrap(), None);
    }

    #[test]
    fn deleting_session_drops_its_values() {
        let (pool, _tmp) = test_db();
        let user = insert_user(&pool, "dave", "user");
        let session = create_session(&pool, &user, 1).unwrap();
        let store = SessionStore::new(pool.clone(), &session.id);
        store.set("csrf_token", "abc").unwrap();

        delete_session(&pool, &session.token).unwrap();

        let count: i64 = pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM session_values", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
