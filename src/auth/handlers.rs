use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::credentials::{self, Registration};
use crate::auth::csrf;
use crate::auth::session::{self, SessionStore};
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::{cookie_value, RequestContext};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email address
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

// -- Cookie helpers --

fn http_only_cookie(name: &str, value: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, value, max_age_secs
    )
}

/// Readable from scripts so they can echo it back in `X-XSRF-Token`.
fn csrf_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; SameSite=Strict; Path=/; Max-Age={}",
        csrf::COOKIE_NAME,
        token,
        max_age_secs
    )
}

fn clear_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

/// Start a session for `user`, issue its CSRF token and build the cookies.
fn start_session(state: &AppState, user: &User) -> AppResult<(String, Vec<(header::HeaderName, String)>)> {
    let auth = &state.config.auth;
    let session = session::create_session(&state.db, &user.id, auth.session_hours)?;
    let store = SessionStore::new(state.db.clone(), session.id.clone());
    let csrf_token = state.csrf.rotate(&store, Utc::now())?;

    let session_secs = (auth.session_hours * 3600) as i64;
    let cookies = vec![
        (
            header::SET_COOKIE,
            http_only_cookie(&auth.cookie_name, &session.token, session_secs),
        ),
        (header::SET_COOKIE, csrf_cookie(&csrf_token, session_secs)),
    ];
    Ok((csrf_token, cookies))
}

// -- Handlers --

/// POST /auth/register: create a plain user account
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<Registration>,
) -> AppResult<Response> {
    let user = credentials::register(&state.db, &req, state.config.auth.bcrypt_cost)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "user": user })),
    )
        .into_response())
}

/// POST /auth/login: password sign-in, optionally remembered
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let user = credentials::verify(&state.db, req.login.trim(), &req.password)?
        .ok_or_else(|| {
            tracing::info!(login = %req.login.trim(), "failed login attempt");
            AppError::InvalidCredentials
        })?;

    let (csrf_token, mut cookies) = start_session(&state, &user)?;

    if req.remember {
        let token = state.remember.issue(&user.id, Utc::now())?;
        cookies.push((
            header::SET_COOKIE,
            http_only_cookie(
                &state.config.auth.remember_cookie_name,
                &token,
                state.remember.lifetime().num_seconds(),
            ),
        ));
    }

    tracing::info!(user_id = %user.id, remember = req.remember, "user logged in");
    Ok((
        StatusCode::OK,
        AppendHeaders(cookies),
        Json(json!({ "success": true, "user": user, "csrf_token": csrf_token })),
    )
        .into_response())
}

/// POST /auth/remember: trade a remember-me cookie for a fresh session
pub async fn remember(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let auth = &state.config.auth;
    let token = cookie_value(&headers, &auth.remember_cookie_name).ok_or(AppError::Unauthorized)?;

    let Some((user_id, new_token)) = state.remember.rotate(token, Utc::now())? else {
        return Ok((
            StatusCode::UNAUTHORIZED,
            [(header::SET_COOKIE, clear_cookie(&auth.remember_cookie_name))],
            Json(json!({ "success": false, "error": "Authentication required" })),
        )
            .into_response());
    };
    let (user, _) = credentials::load_actor(&state.db, &user_id)?.ok_or(AppError::Unauthorized)?;

    let (csrf_token, mut cookies) = start_session(&state, &user)?;
    cookies.push((
        header::SET_COOKIE,
        http_only_cookie(
            &auth.remember_cookie_name,
            &new_token,
            state.remember.lifetime().num_seconds(),
        ),
    ));

    tracing::info!(user_id = %user.id, "session restored from remember token");
    Ok((
        StatusCode::OK,
        AppendHeaders(cookies),
        Json(json!({ "success": true, "user": user, "csrf_token": csrf_token })),
    )
        .into_response())
}

/// GET /auth/csrf: current token for the session, rotated when stale
pub async fn csrf_token(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Response> {
    let token = state.csrf.issue(&ctx.store, Utc::now())?;
    let max_age = (state.config.auth.session_hours * 3600) as i64;
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, csrf_cookie(&token, max_age))],
        Json(json!({ "success": true, "csrf_token": token })),
    )
        .into_response())
}

/// POST /auth/logout: always ends in a redirect, whatever fails along the way
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let auth = &state.config.auth;

    if let Some(token) = cookie_value(&headers, &auth.remember_cookie_name) {
        if let Err(e) = state.remember.revoke(token, Utc::now()) {
            tracing::warn!("Failed to revoke remember token on logout: {}", e);
        }
    }

    let cookies = vec![
        (header::SET_COOKIE, clear_cookie(&auth.remember_cookie_name)),
        (header::SET_COOKIE, clear_cookie(&auth.cookie_name)),
        (header::SET_COOKIE, clear_cookie(csrf::COOKIE_NAME)),
    ];

    if let Some(token) = cookie_value(&headers, &auth.cookie_name) {
        if let Err(e) = session::delete_session(&state.db, token) {
            tracing::warn!("Failed to delete session on logout: {}", e);
        }
    }

    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, "/")],
        AppendHeaders(cookies),
    )
        .into_response()
}
