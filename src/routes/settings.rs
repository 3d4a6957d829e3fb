use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::auth::policy::{authorize, Action, Resource};
use crate::error::{AppError, AppResult};
use crate::extractors::RequestContext;
use crate::settings::{self, BACKUP_CATEGORY, BACKUP_KEYS};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/admin/settings/backup",
        get(backup_settings).put(update_backup_settings),
    )
}

#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

/// Stored overrides next to the settings they resolve to.
async fn backup_settings(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Response> {
    authorize(&ctx.actor, Resource::Settings, Action::Read)?;
    let stored: BTreeMap<String, String> = settings::load_category(&state.db, BACKUP_CATEGORY)?
        .into_iter()
        .collect();
    let effective = settings::resolve_backup_settings(&state.db, &state.config)?;
    Ok(Json(json!({
        "success": true,
        "stored": stored,
        "effective": effective,
        "keys": BACKUP_KEYS,
    }))
    .into_response())
}

async fn update_backup_settings(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<UpdateSettingsRequest>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, req.csrf_token.as_deref())?;
    authorize(&ctx.actor, Resource::Settings, Action::Update)?;

    // Reject the whole request before writing anything
    if let Some(unknown) = req.settings.keys().find(|k| !BACKUP_KEYS.contains(&k.as_str())) {
        return Err(AppError::BadRequest(format!("Unknown backup setting: {}", unknown)));
    }
    for (key, value) in &req.settings {
        settings::put_setting(&state.db, BACKUP_CATEGORY, key, value)?;
    }
    tracing::info!(
        user_id = %ctx.actor.user_id,
        count = req.settings.len(),
        "backup settings updated"
    );

    let effective = settings::resolve_backup_settings(&state.db, &state.config)?;
    Ok(Json(json!({ "success": true, "effective": effective })).into_response())
}
