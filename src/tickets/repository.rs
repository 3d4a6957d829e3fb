use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use super::domain::{Priority, Ticket, TicketMessage, TicketStatus};
use crate::db::{format_timestamp, get_opt_timestamp, get_timestamp, RepositoryError};
use crate::moderation::repository::in_transaction;
use crate::state::DbPool;

#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn insert(&self, ticket: &Ticket) -> Result<(), RepositoryError>;

    async fn load(&self, id: &str) -> Result<Option<Ticket>, RepositoryError>;

    async fn update(&self, ticket: &Ticket) -> Result<(), RepositoryError>;

    /// Store the message and the ticket's new state together.
    async fn append_message(&self, ticket: &Ticket, message: &TicketMessage) -> Result<(), RepositoryError>;

    async fn messages(&self, ticket_id: &str, include_internal: bool) -> Result<Vec<TicketMessage>, RepositoryError>;

    /// Newest first. `None` lists every ticket.
    async fn list(&self, client_profile_id: Option<&str>) -> Result<Vec<Ticket>, RepositoryError>;

    async fn profile_exists(&self, client_profile_id: &str) -> Result<bool, RepositoryError>;

    async fn is_staff_user(&self, user_id: &str) -> Result<bool, RepositoryError>;
}

pub struct SqliteTicketRepository {
    pool: DbPool,
}

impl SqliteTicketRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const TICKET_COLUMNS: &str = "id, client_profile_id, subject, description, priority, status,
     assigned_to, created_at, updated_at, resolved_at, closed_at";

fn ticket_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Ticket> {
    let priority: String = row.get(4)?;
    let status: String = row.get(5)?;
    Ok(Ticket {
        id: row.get(0)?,
        client_profile_id: row.get(1)?,
        subject: row.get(2)?,
        description: row.get(3)?,
        priority: Priority::parse_or_default(Some(&priority)),
        status: TicketStatus::parse(&status).unwrap_or(TicketStatus::Open),
        assigned_to: row.get(6)?,
        created_at: get_timestamp(row, 7)?,
        updated_at: get_timestamp(row, 8)?,
        resolved_at: get_opt_timestamp(row, 9)?,
        closed_at: get_opt_timestamp(row, 10)?,
    })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TicketMessage> {
    Ok(TicketMessage {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        author_id: row.get(2)?,
        body: row.get(3)?,
        is_internal: row.get(4)?,
        created_at: get_timestamp(row, 5)?,
    })
}

fn write_ticket(conn: &rusqlite::Connection, ticket: &Ticket) -> Result<(), RepositoryError> {
    let rows = conn.execute(
        "UPDATE support_tickets SET status = ?1, assigned_to = ?2, updated_at = ?3,
           resolved_at = ?4, closed_at = ?5
         WHERE id = ?6",
        params![
            ticket.status.as_str(),
            ticket.assigned_to,
            format_timestamp(ticket.updated_at),
            ticket.resolved_at.map(format_timestamp),
            ticket.closed_at.map(format_timestamp),
            ticket.id,
        ],
    )?;
    if rows == 0 {
        return Err(RepositoryError::NotFound(format!("ticket {}", ticket.id)));
    }
    Ok(())
}

#[async_trait]
impl TicketRepository for SqliteTicketRepository {
    async fn insert(&self, ticket: &Ticket) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO support_tickets (id, client_profile_id, subject, description, priority,
                 status, assigned_to, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                ticket.id,
                ticket.client_profile_id,
                ticket.subject,
                ticket.description,
                ticket.priority.as_str(),
                ticket.status.as_str(),
                ticket.assigned_to,
                format_timestamp(ticket.created_at),
                format_timestamp(ticket.updated_at),
            ],
        )?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Ticket>, RepositoryError> {
        let conn = self.pool.get()?;
        let ticket = conn
            .query_row(
                &format!("SELECT {} FROM support_tickets WHERE id = ?1", TICKET_COLUMNS),
                params![id],
                ticket_from_row,
            )
            .optional()?;
        Ok(ticket)
    }

    async fn update(&self, ticket: &Ticket) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        write_ticket(&conn, ticket)
    }

    async fn append_message(&self, ticket: &Ticket, message: &TicketMessage) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        in_transaction(&conn, || {
            conn.execute(
                "INSERT INTO ticket_messages (id, ticket_id, author_id, body, is_internal, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.id,
                    message.ticket_id,
                    message.author_id,
                    message.body,
                    message.is_internal,
                    format_timestamp(message.created_at),
                ],
            )?;
            write_ticket(&conn, ticket)
        })
    }

    async fn messages(&self, ticket_id: &str, include_internal: bool) -> Result<Vec<TicketMessage>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, ticket_id, author_id, body, is_internal, created_at
             FROM ticket_messages
             WHERE ticket_id = ?1 AND (?2 = 1 OR is_internal = 0)
             ORDER BY created_at, id",
        )?;
        let messages = stmt
            .query_map(params![ticket_id, include_internal], message_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    async fn list(&self, client_profile_id: Option<&str>) -> Result<Vec<Ticket>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM support_tickets
             WHERE ?1 IS NULL OR client_profile_id = ?1
             ORDER BY created_at DESC, id DESC",
            TICKET_COLUMNS
        ))?;
        let tickets = stmt
            .query_map(params![client_profile_id], ticket_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tickets)
    }

    async fn profile_exists(&self, client_profile_id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM client_profiles WHERE id = ?1",
            params![client_profile_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn is_staff_user(&self, user_id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let staff: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE id = ?1 AND role IN ('admin', 'employee')",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(staff)
    }
}
