use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use chrono::Utc;

use crate::auth::credentials;
use crate::auth::csrf::SubmittedTokens;
use crate::auth::policy::Actor;
use crate::auth::session::{self, Session, SessionStore};
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Everything a handler needs to know about the caller.
///
/// Built once per request from the session cookie; handlers receive it
/// explicitly and never read ambient session state.
#[derive(Clone)]
pub struct RequestContext {
    pub user: User,
    pub actor: Actor,
    pub session: Session,
    pub store: SessionStore,
    pub submitted: SubmittedTokens,
}

impl RequestContext {
    /// Reject the request unless it carries a valid CSRF token.
    /// `body_token` is the form/JSON field, checked before headers and cookies.
    pub fn require_csrf(&self, state: &AppState, body_token: Option<&str>) -> AppResult<()> {
        let submitted = self.submitted.clone().with_body(body_token);
        if state.csrf.validate(&self.store, &submitted, Utc::now())? {
            Ok(())
        } else {
            Err(AppError::BadRequest("Invalid or missing CSRF token".into()))
        }
    }
}

/// Requires an authenticated session; 401 otherwise.
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_value(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        let session = session::find_session(&state.db, token)?.ok_or(AppError::Unauthorized)?;
        let (user, actor) =
            credentials::load_actor(&state.db, &session.user_id)?.ok_or(AppError::Unauthorized)?;
        let store = SessionStore::new(state.db.clone(), session.id.clone());

        Ok(RequestContext {
            user,
            actor,
            session,
            store,
            submitted: SubmittedTokens::from_headers(&parts.headers),
        })
    }
}

/// Optional context: `None` instead of 401 when not signed in.
pub struct MaybeContext(pub Option<RequestContext>);

impl FromRequestParts<AppState> for MaybeContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match RequestContext::from_request_parts(parts, state).await {
            Ok(ctx) => Ok(MaybeContext(Some(ctx))),
            Err(AppError::Unauthorized) => Ok(MaybeContext(None)),
            Err(e) => Err(e),
        }
    }
}

/// Read one cookie from the request headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}
