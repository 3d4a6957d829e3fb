//! CSRF token issuance and validation.
//!
//! A token is accepted when any submitted candidate (body field, then the
//! `X-CSRF-Token` / `X-XSRF-Token` headers, then the `XSRF-TOKEN` cookie)
//! equals any expected value stored in the session under one of the
//! configured keys. The first configured key is the one this server issues;
//! the others are legacy locations still written by older clients.

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};

use crate::auth::session::{generate_token, SessionStore};
use crate::db::RepositoryError;
use crate::extractors::cookie_value;

pub const HEADER_NAMES: &[&str] = &["x-csrf-token", "x-xsrf-token"];
pub const COOKIE_NAME: &str = "XSRF-TOKEN";

/// Tokens a request presented, in the order they are checked.
#[derive(Debug, Clone, Default)]
pub struct SubmittedTokens {
    pub body: Option<String>,
    pub headers: Vec<String>,
    pub cookie: Option<String>,
}

impl SubmittedTokens {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header_tokens = HEADER_NAMES
            .iter()
            .filter_map(|name| headers.get(*name))
            .filter_map(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .collect();

        Self {
            body: None,
            headers: header_tokens,
            cookie: cookie_value(headers, COOKIE_NAME).map(str::to_string),
        }
    }

    pub fn with_body(mut self, body: Option<&str>) -> Self {
        self.body = body.map(str::to_string);
        self
    }

    /// Non-empty candidates in fallback order.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.body
            .iter()
            .chain(self.headers.iter())
            .chain(self.cookie.iter())
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Configuration slice the validator needs.
#[derive(Debug, Clone)]
pub struct CsrfPolicy {
    pub session_keys: Vec<String>,
    pub ttl: Duration,
}

impl CsrfPolicy {
    pub fn new(session_keys: Vec<String>, ttl_minutes: i64) -> Self {
        Self {
            session_keys,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    fn canonical_key(&self) -> &str {
        self.session_keys
            .first()
            .map(String::as_str)
            .unwrap_or("csrf_token")
    }

    fn issued_at_key(&self) -> String {
        format!("{}_issued_at", self.canonical_key())
    }

    /// Return the session's current token, minting a new one when absent or stale.
    pub fn issue(&self, store: &SessionStore, now: DateTime<Utc>) -> Result<String, RepositoryError> {
        if let Some(token) = self.fresh_canonical(store, now)? {
            return Ok(token);
        }

        let token = generate_token();
        store.set(self.canonical_key(), &token)?;
        store.set(&self.issued_at_key(), &now.to_rfc3339())?;
        tracing::debug!(session_id = store.session_id(), "issued CSRF token");
        Ok(token)
    }

    /// Force a new token, e.g. after login.
    pub fn rotate(&self, store: &SessionStore, now: DateTime<Utc>) -> Result<String, RepositoryError> {
        store.remove(self.canonical_key())?;
        self.issue(store, now)
    }

    pub fn validate(
        &self,
        store: &SessionStore,
        submitted: &SubmittedTokens,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut expected = Vec::with_capacity(self.session_keys.len());
        if let Some(token) = self.fresh_canonical(store, now)? {
            expected.push(token);
        }
        for key in self.session_keys.iter().skip(1) {
            if let Some(value) = store.get(key)? {
                expected.push(value);
            }
        }

        let candidates: Vec<&str> = submitted.candidates().collect();
        let ok = matches_any(&candidates, &expected);
        if !ok {
            tracing::warn!(
                session_id = store.session_id(),
                candidates = candidates.len(),
                "CSRF validation failed"
            );
        }
        Ok(ok)
    }

    fn fresh_canonical(
        &self,
        store: &SessionStore,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, RepositoryError> {
        let Some(token) = store.get(self.canonical_key())? else {
            return Ok(None);
        };
        let issued_at = store
            .get(&self.issued_at_key())?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        match issued_at {
            Some(issued) if now - issued <= self.ttl => Ok(Some(token)),
            _ => Ok(None),
        }
    }
}

/// True when any non-empty candidate equals any non-empty expected value.
///
/// Every pair is compared so the time taken does not depend on which one matched.
pub fn matches_any(candidates: &[&str], expected: &[String]) -> bool {
    let mut matched = false;
    for candidate in candidates.iter().filter(|c| !c.is_empty()) {
        for value in expected.iter().filter(|v| !v.is_empty()) {
            matched |= constant_time_eq(candidate.as_bytes(), value.as_bytes());
        }
    }
    matched
}

/// Byte comparison whose running time depends only on the longer input.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let len_match = a.len() == b.len();
    let max_len = a.len().max(b.len());

    let mut result = 0u8;
    for i in 0..max_len {
        let byte_a = a.get(i).copied().unwrap_or(0);
        let byte_b = b.get(i).copied().unwrap_or(0);
        result |= byte_a ^ byte_b;
    }

    len_match && result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::create_session;
    use crate::db::testing::{insert_user, test_db};
    use axum::http::HeaderValue;

    fn policy() -> CsrfPolicy {
        CsrfPolicy::new(
            vec!["csrf_token".into(), "_token".into(), "form_token".into()],
            120,
        )
    }

    fn body(token: &str) -> SubmittedTokens {
        SubmittedTokens::default().with_body(Some(token))
    }

    #[test]
    fn constant_time_eq_behaves_like_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn matches_any_rejects_empty_values() {
        assert!(!matches_any(&[], &["t".into()]));
        assert!(!matches_any(&[""], &["".into()]));
        assert!(!matches_any(&["t"], &[]));
        assert!(matches_any(&["x", "t"], &["y".into(), "t".into()]));
    }

    #[test]
    fn candidates_follow_fallback_order_and_skip_empty() {
        let mut headers = HeaderMap::new();
        headers.insert("x-xsrf-token", HeaderValue::from_static("from-header"));
        headers.insert("cookie", HeaderValue::from_static("XSRF-TOKEN=from-cookie; other=1"));

        let submitted = SubmittedTokens::from_headers(&headers).with_body(Some(""));
        let candidates: Vec<&str> = submitted.candidates().collect();
        assert_eq!(candidates, vec!["from-header", "from-cookie"]);
    }

    #[test]
    fn issued_token_validates_and_is_reused_while_fresh() {
        let (pool, _tmp) = test_db();
        let user = insert_user(&pool, "alice", "user");
        let session = create_session(&pool, &user, 1).unwrap();
        let store = SessionStore::new(pool.clone(), &session.id);
        let now = Utc::now();

        let token = policy().issue(&store, now).unwrap();
        assert_eq!(policy().issue(&store, now).unwrap(), token);
        assert!(policy().validate(&store, &body(&token), now).unwrap());
        assert!(!policy().validate(&store, &body("wrong"), now).unwrap());
    }

    #[test]
    fn missing_tokens_are_rejected() {
        let (pool, _tmp) = test_db();
        let user = insert_user(&pool, "bob", "user");
        let session = create_session(&pool, &user, 1).unwrap();
        let store = SessionStore::new(pool.clone(), &session.id);
        let now = Utc::now();
        policy().issue(&store, now).unwrap();

        assert!(!policy()
            .validate(&store, &SubmittedTokens::default(), now)
            .unwrap());
        assert!(!policy().validate(&store, &body(""), now).unwrap());
    }

    #[test]
    fn legacy_session_keys_are_accepted() {
        let (pool, _tmp) = test_db();
        let user = insert_user(&pool, "carol", "user");
        let session = create_session(&pool, &user, 1).unwrap();
        let store = SessionStore::new(pool.clone(), &session.id);
        let now = Utc::now();

        store.set("_token", "legacy-one").unwrap();
        store.set("form_token", "legacy-two").unwrap();

        assert!(policy().validate(&store, &body("legacy-one"), now).unwrap());
        assert!(policy().validate(&store, &body("legacy-two"), now).unwrap());

        // Keys outside the configured list are never consulted
        store.set("unrelated", "sneaky").unwrap();
        assert!(!policy().validate(&store, &body("sneaky"), now).unwrap());
    }

    #[test]
    fn stale_canonical_token_is_rejected_then_rotated() {
        let (pool, _tmp) = test_db();
        let user = insert_user(&pool, "dave", "user");
        let session = create_session(&pool, &user, 1).unwrap();
        let store = SessionStore::new(pool.clone(), &session.id);

        let issued = Utc::now() - Duration::hours(5);
        let old = policy().issue(&store, issued).unwrap();

        let now = Utc::now();
        assert!(!policy().validate(&store, &body(&old), now).unwrap());
        let new = policy().issue(&store, now).unwrap();
        assert_ne!(old, new);
        assert!(policy().validate(&store, &body(&new), now).unwrap());
    }

    #[test]
    fn rotate_replaces_fresh_token() {
        let (pool, _tmp) = test_db();
        let user = insert_user(&pool, "erin", "user");
        let session = create_session(&pool, &user, 1).unwrap();
        let store = SessionStore::new(pool.clone(), &session.id);
        let now = Utc::now();

        let first = policy().issue(&store, now).unwrap();
        let second = policy().rotate(&store, now).unwrap();
        assert_ne!(first, second);
        assert!(!policy().validate(&store, &body(&first), now).unwrap());
    }
}
