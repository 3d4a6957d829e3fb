use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extractors::RequestContext;
use crate::moderation::{ModerationAction, NewProject};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/projects", post(create_project))
        .route("/api/projects/{id}/submit", post(submit_project))
        .route("/api/projects/{id}/visibility", post(toggle_visibility))
        .route("/api/projects/{id}/history", get(project_history))
        .route("/api/admin/projects/pending", get(pending_projects))
        .route("/api/admin/projects/{id}/moderate", post(moderate_project))
        .route("/api/admin/projects/bulk-moderate", post(bulk_moderate))
}

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    #[serde(flatten)]
    pub project: NewProject,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Deserialize)]
pub struct ModerateRequest {
    pub action: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Deserialize)]
pub struct BulkModerateRequest {
    pub ids: Vec<String>,
    pub action: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

fn parse_action(raw: &str) -> AppResult<ModerationAction> {
    ModerationAction::parse(raw).ok_or_else(|| AppError::BadRequest("Invalid action".into()))
}

async fn create_project(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateProjectRequest>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, req.csrf_token.as_deref())?;
    let project = state.projects.create_project(&ctx.actor, req.project).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "project": project })),
    )
        .into_response())
}

async fn submit_project(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, None)?;
    let project = state.projects.submit_project(&ctx.actor, &id).await?;
    Ok(Json(json!({ "success": true, "project": project })).into_response())
}

async fn toggle_visibility(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, None)?;
    let project = state.projects.toggle_visibility(&ctx.actor, &id).await?;
    Ok(Json(json!({ "success": true, "project": project })).into_response())
}

async fn project_history(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let events = state.projects.history(&ctx.actor, &id).await?;
    Ok(Json(json!({ "success": true, "events": events })).into_response())
}

async fn pending_projects(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Response> {
    let projects = state.projects.list_pending_projects(&ctx.actor).await?;
    Ok(Json(json!({ "success": true, "projects": projects })).into_response())
}

async fn moderate_project(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(req): Json<ModerateRequest>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, req.csrf_token.as_deref())?;
    let action = parse_action(&req.action)?;
    let project = state
        .projects
        .moderate_project(&ctx.actor, &id, action, req.notes)
        .await?;
    Ok(Json(json!({ "success": true, "project": project })).into_response())
}

async fn bulk_moderate(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<BulkModerateRequest>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, req.csrf_token.as_deref())?;
    let action = parse_action(&req.action)?;
    let result = state
        .projects
        .bulk_moderate(&ctx.actor, &req.ids, action, req.notes)
        .await?;
    Ok(Json(json!({
        "success": true,
        "processed_count": result.processed_count,
        "errors": result.errors,
    }))
    .into_response())
}
