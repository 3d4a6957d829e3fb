//! Support tickets: client requests, threaded replies and staff triage.

pub mod domain;
pub mod repository;

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::policy::{authorize, AccessDenied, Action, Actor, Resource, Role};
use crate::db::RepositoryError;
use crate::state::DbPool;

pub use domain::{NewTicket, Priority, ReplyAuthor, Ticket, TicketMessage, TicketStatus};
pub use repository::{SqliteTicketRepository, TicketRepository};

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("Ticket not found")]
    NotFound,

    #[error(transparent)]
    Denied(#[from] AccessDenied),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A ticket with the messages the viewer may see.
#[derive(Debug, Clone, Serialize)]
pub struct TicketThread {
    pub ticket: Ticket,
    pub messages: Vec<TicketMessage>,
}

#[derive(Clone)]
pub struct TicketWorkflow {
    repo: Arc<dyn TicketRepository>,
}

impl TicketWorkflow {
    pub fn new(repo: Arc<dyn TicketRepository>) -> Self {
        Self { repo }
    }

    pub fn sqlite(pool: DbPool) -> Self {
        Self::new(Arc::new(SqliteTicketRepository::new(pool)))
    }

    /// Load a ticket and check `action` on it. Non-staff get `Denied` for
    /// missing tickets too, so ids cannot be enumerated.
    async fn load_authorized(&self, actor: &Actor, id: &str, action: Action) -> Result<Ticket, TicketError> {
        let Some(ticket) = self.repo.load(id).await? else {
            if actor.is_staff() {
                return Err(TicketError::NotFound);
            }
            return Err(AccessDenied.into());
        };
        authorize(
            actor,
            Resource::Ticket { owner_profile_id: &ticket.client_profile_id },
            action,
        )?;
        Ok(ticket)
    }

    pub async fn create_ticket(&self, actor: &Actor, new: NewTicket) -> Result<Ticket, TicketError> {
        let profile_id = match actor.role {
            Role::Client => actor.client_profile_id.clone().ok_or(AccessDenied)?,
            Role::Admin | Role::Employee => new.client_profile_id.clone().ok_or_else(|| {
                TicketError::Invalid("client_profile_id is required when staff open a ticket".into())
            })?,
            Role::User => return Err(AccessDenied.into()),
        };
        authorize(actor, Resource::Ticket { owner_profile_id: &profile_id }, Action::Create)?;

        if !self.repo.profile_exists(&profile_id).await? {
            return Err(TicketError::Invalid("Unknown client profile".into()));
        }

        let ticket = Ticket::open(&profile_id, &new, Utc::now())?;
        self.repo.insert(&ticket).await?;
        tracing::info!(
            ticket_id = %ticket.id,
            profile_id = %profile_id,
            priority = ticket.priority.as_str(),
            "support ticket opened"
        );
        Ok(ticket)
    }

    pub async fn add_message(
        &self,
        actor: &Actor,
        ticket_id: &str,
        body: &str,
        is_internal: bool,
    ) -> Result<TicketMessage, TicketError> {
        let ticket = self.load_authorized(actor, ticket_id, Action::Update).await?;
        if is_internal {
            authorize(actor, Resource::TicketInternal, Action::Create)?;
        }

        let author = if actor.is_staff() {
            ReplyAuthor::Staff
        } else {
            ReplyAuthor::Client
        };
        let previous = ticket.status;
        let (ticket, message) = ticket.reply(author, &actor.user_id, body, is_internal, Utc::now())?;
        self.repo.append_message(&ticket, &message).await?;

        if ticket.status != previous {
            tracing::info!(
                ticket_id,
                from = %previous,
                to = %ticket.status,
                "ticket status changed by reply"
            );
        }
        Ok(message)
    }

    pub async fn update_status(
        &self,
        actor: &Actor,
        ticket_id: &str,
        status: TicketStatus,
        assignee: Option<Option<String>>,
    ) -> Result<Ticket, TicketError> {
        let ticket = self.load_authorized(actor, ticket_id, Action::Moderate).await?;

        if let Some(Some(user_id)) = &assignee {
            if !self.repo.is_staff_user(user_id).await? {
                return Err(TicketError::Invalid("Tickets can only be assigned to staff".into()));
            }
        }

        let previous = ticket.status;
        let updated = ticket.update_status(status, assignee, Utc::now());
        self.repo.update(&updated).await?;
        tracing::info!(
            ticket_id,
            by = %actor.user_id,
            from = %previous,
            to = %updated.status,
            "ticket status updated"
        );
        Ok(updated)
    }

    pub async fn get_ticket(&self, actor: &Actor, ticket_id: &str) -> Result<TicketThread, TicketError> {
        let ticket = self.load_authorized(actor, ticket_id, Action::Read).await?;
        let messages = self.repo.messages(&ticket.id, actor.is_staff()).await?;
        Ok(TicketThread { ticket, messages })
    }

    /// Staff see every ticket; clients their own; everyone else nothing.
    pub async fn list_tickets(&self, actor: &Actor) -> Result<Vec<Ticket>, TicketError> {
        if actor.is_staff() {
            return Ok(self.repo.list(None).await?);
        }
        let profile_id = actor.client_profile_id.as_deref().ok_or(AccessDenied)?;
        authorize(actor, Resource::Ticket { owner_profile_id: profile_id }, Action::Read)?;
        Ok(self.repo.list(Some(profile_id)).await?)
    }
}
