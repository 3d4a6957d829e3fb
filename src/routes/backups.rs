use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::auth::policy::{authorize, Action, Resource};
use crate::backup::{self, BackupEngine, BackupError, BackupKind};
use crate::error::{AppError, AppResult};
use crate::extractors::RequestContext;
use crate::settings;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/backups", get(list_backups).post(create_backup))
        .route("/api/admin/backups/cleanup", post(cleanup_backups))
        .route(
            "/api/admin/backups/{file}",
            get(download_backup).delete(delete_backup),
        )
        .route("/api/admin/backups/{file}/restore", post(restore_backup))
        .route("/api/admin/backups/{file}/verify", post(verify_backup))
}

#[derive(Deserialize, Default)]
pub struct CreateBackupRequest {
    /// `full` (default) or `structure`
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub cleanup: bool,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

/// Resolve settings and run `f` against an engine on the blocking pool.
async fn with_engine<T, F>(state: &AppState, f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(BackupEngine) -> Result<T, BackupError> + Send + 'static,
{
    let pool = state.db.clone();
    let config = state.config.clone();
    let result = tokio::task::spawn_blocking(move || -> Result<T, BackupError> {
        let settings = settings::resolve_backup_settings(&pool, &config)?;
        f(BackupEngine::new(pool, settings))
    })
    .await?;
    Ok(result?)
}

async fn list_backups(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Response> {
    authorize(&ctx.actor, Resource::Backup, Action::Read)?;
    let (backups, settings) = with_engine(&state, |engine| {
        let backups = engine.list_backups()?;
        Ok((backups, engine.settings().clone()))
    })
    .await?;
    Ok(Json(json!({ "success": true, "backups": backups, "settings": settings })).into_response())
}

async fn create_backup(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateBackupRequest>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, req.csrf_token.as_deref())?;
    authorize(&ctx.actor, Resource::Backup, Action::Create)?;

    let kind = match req.kind.as_deref().map(str::trim) {
        None | Some("") | Some("full") => BackupKind::Full,
        Some("structure") => BackupKind::Structure,
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "Unknown backup type: {}",
                other
            )))
        }
    };

    tracing::info!(user_id = %ctx.actor.user_id, %kind, "manual backup requested");
    let run = backup::run_backup(
        state.db.clone(),
        &state.config,
        state.mailer.clone(),
        kind,
        req.cleanup,
    )
    .await?;

    let status = if run.report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((
        status,
        Json(json!({
            "success": run.report.success,
            "error": run.report.error,
            "backup": run.report,
            "removed": run.removed,
            "notified": run.notified,
        })),
    )
        .into_response())
}

async fn download_backup(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(file): Path<String>,
) -> AppResult<Response> {
    authorize(&ctx.actor, Resource::Backup, Action::Read)?;
    let name = file.clone();
    let bytes = with_engine(&state, move |engine| engine.read_backup(&name)).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/gzip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn delete_backup(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(file): Path<String>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, None)?;
    authorize(&ctx.actor, Resource::Backup, Action::Delete)?;
    let name = file.clone();
    with_engine(&state, move |engine| engine.delete_backup(&name)).await?;
    tracing::info!(user_id = %ctx.actor.user_id, filename = %file, "backup deleted");
    Ok(Json(json!({ "success": true, "deleted": file })).into_response())
}

async fn restore_backup(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(file): Path<String>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, None)?;
    authorize(&ctx.actor, Resource::Backup, Action::Update)?;
    tracing::warn!(user_id = %ctx.actor.user_id, filename = %file, "restore requested");
    let report = with_engine(&state, move |engine| engine.restore_backup(&file)).await?;
    Ok(Json(json!({ "success": true, "restore": report })).into_response())
}

async fn verify_backup(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(file): Path<String>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, None)?;
    authorize(&ctx.actor, Resource::Backup, Action::Read)?;
    let name = file.clone();
    let valid = with_engine(&state, move |engine| engine.verify_backup(&name)).await?;
    Ok(Json(json!({ "success": true, "filename": file, "valid": valid })).into_response())
}

async fn cleanup_backups(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Response> {
    ctx.require_csrf(&state, None)?;
    authorize(&ctx.actor, Resource::Backup, Action::Delete)?;
    let removed = with_engine(&state, |engine| engine.clean_old_backups()).await?;
    Ok(Json(json!({ "success": true, "removed": removed })).into_response())
}
