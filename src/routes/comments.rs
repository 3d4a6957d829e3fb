use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::comments::{CommentAction, NewComment, TargetType};
use crate::error::{AppError, AppResult};
use crate::extractors::{MaybeContext, RequestContext};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/comments", get(list_comments).post(create_comment))
        .route("/api/comments/{id}", delete(delete_comment))
        .route("/api/admin/comments/{id}/moderate", post(moderate_comment))
        .route("/api/admin/comments/bulk-moderate", post(bulk_moderate))
}

#[derive(Deserialize)]
pub struct CommentQuery {
    pub target_type: String,
    pub target_id: String,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    #[serde(flatten)]
    pub comment: NewComment,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Deserialize)]
pub struct ModerateCommentRequest {
    pub action: String,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Deserialize)]
pub struct BulkModerateCommentsRequest {
    pub ids: Vec<String>,
    pub action: String,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

fn parse_action(raw: &str) -> AppResult<CommentAction> {
    CommentAction::parse(raw).ok_or_else(|| AppError::BadRequest("Invalid action".into()))
}

async fn list_comments(
    State(state): State<AppState>,
    MaybeContext(ctx): MaybeContext,
    Query(query): Query<CommentQuery>,
) -> AppResult<Response> {
    let target_type = TargetType::parse(&query.target_type)
        .ok_or_else(|| AppError::BadRequest("Invalid target type".into()))?;
    let comments = state
        .comments
        .list_comments(ctx.as_ref().map(|c| &c.actor), target_type, &query.target_id)
        .await?;
    Ok(Json(json!({ "success": true, "comments": comments })).into_response())
}

async fn create_comment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, req.csrf_token.as_deref())?;
    let comment = state.comments.create_comment(&ctx.actor, req.comment).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "comment": comment })),
    )
        .into_response())
}

async fn delete_comment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, None)?;
    let comment = state.comments.soft_delete_comment(&ctx.actor, &id).await?;
    Ok(Json(json!({ "success": true, "comment": comment })).into_response())
}

async fn moderate_comment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(req): Json<ModerateCommentRequest>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, req.csrf_token.as_deref())?;
    let action = parse_action(&req.action)?;
    let comment = state.comments.moderate_comment(&ctx.actor, &id, action).await?;
    Ok(Json(json!({ "success": true, "comment": comment })).into_response())
}

async fn bulk_moderate(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<BulkModerateCommentsRequest>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, req.csrf_token.as_deref())?;
    let action = parse_action(&req.action)?;
    let result = state
        .comments
        .bulk_moderate_comments(&ctx.actor, &req.ids, action)
        .await?;
    Ok(Json(json!({
        "success": true,
        "processed_count": result.processed_count,
        "errors": result.errors,
    }))
    .into_response())
}
