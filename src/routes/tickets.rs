use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Deserializer};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extractors::RequestContext;
use crate::state::AppState;
use crate::tickets::{NewTicket, TicketStatus};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/{id}", get(get_ticket))
        .route("/api/tickets/{id}/messages", post(add_message))
        .route("/api/tickets/{id}/status", post(update_status))
}

#[derive(Deserialize)]
pub struct CreateTicketRequest {
    #[serde(flatten)]
    pub ticket: NewTicket,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Deserialize)]
pub struct AddMessageRequest {
    pub message: String,
    #[serde(default)]
    pub is_internal: bool,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    /// Absent leaves the assignee alone; `null` unassigns.
    #[serde(default, deserialize_with = "present")]
    pub assigned_to: Option<Option<String>>,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

async fn list_tickets(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Response> {
    let tickets = state.tickets.list_tickets(&ctx.actor).await?;
    Ok(Json(json!({ "success": true, "tickets": tickets })).into_response())
}

async fn create_ticket(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateTicketRequest>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, req.csrf_token.as_deref())?;
    let ticket = state.tickets.create_ticket(&ctx.actor, req.ticket).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "ticket": ticket })),
    )
        .into_response())
}

async fn get_ticket(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let thread = state.tickets.get_ticket(&ctx.actor, &id).await?;
    Ok(Json(json!({
        "success": true,
        "ticket": thread.ticket,
        "messages": thread.messages,
    }))
    .into_response())
}

async fn add_message(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(req): Json<AddMessageRequest>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, req.csrf_token.as_deref())?;
    let message = state
        .tickets
        .add_message(&ctx.actor, &id, &req.message, req.is_internal)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": message })),
    )
        .into_response())
}

async fn update_status(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<Response> {
    ctx.require_csrf(&state, req.csrf_token.as_deref())?;
    let status = TicketStatus::parse(&req.status)
        .ok_or_else(|| AppError::BadRequest("Invalid status".into()))?;
    let ticket = state
        .tickets
        .update_status(&ctx.actor, &id, status, req.assigned_to)
        .await?;
    Ok(Json(json!({ "success": true, "ticket": ticket })).into_response())
}
