use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::notify::{self, ContactForm};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/contact", post(submit_contact))
}

/// Public form; no session needed.
async fn submit_contact(
    State(state): State<AppState>,
    Json(form): Json<ContactForm>,
) -> AppResult<Response> {
    form.validate().map_err(AppError::BadRequest)?;
    let admin_email = state
        .config
        .mail
        .admin_email
        .as_deref()
        .ok_or_else(|| AppError::Internal("mail.admin_email is not configured".into()))?;
    notify::send_contact_form(state.mailer.as_ref(), admin_email, &form).await?;
    Ok(Json(json!({ "success": true })).into_response())
}
