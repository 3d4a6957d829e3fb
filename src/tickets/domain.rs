// Domain types - support ticket lifecycle, pure transitions
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::TicketError;

pub const SUBJECT_MIN: usize = 5;
pub const SUBJECT_MAX: usize = 255;
pub const DESCRIPTION_MIN: usize = 10;
pub const MESSAGE_MAX: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    WaitingClient,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "waiting_client" => Some(Self::WaitingClient),
            "resolved" => Some(Self::Resolved),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::WaitingClient => "waiting_client",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Case-insensitive; anything unrecognised becomes `Medium`.
    pub fn parse_or_default(s: Option<&str>) -> Self {
        match s.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("low") => Self::Low,
            Some("high") => Self::High,
            Some("critical") => Self::Critical,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTicket {
    pub subject: String,
    pub description: String,
    pub priority: Option<String>,
    /// Staff opening a ticket on a client's behalf name the profile here.
    pub client_profile_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticket {
    pub id: String,
    pub client_profile_id: String,
    pub subject: String,
    pub description: String,
    pub priority: Priority,
    pub status: TicketStatus,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketMessage {
    pub id: String,
    pub ticket_id: String,
    pub author_id: String,
    pub body: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

/// Who wrote a reply, relative to the ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyAuthor {
    Staff,
    Client,
}

impl Ticket {
    pub fn open(client_profile_id: &str, new: &NewTicket, now: DateTime<Utc>) -> Result<Self, TicketError> {
        let subject = new.subject.trim();
        let subject_len = subject.chars().count();
        if !(SUBJECT_MIN..=SUBJECT_MAX).contains(&subject_len) {
            return Err(TicketError::Invalid(format!(
                "Subject must be between {} and {} characters",
                SUBJECT_MIN, SUBJECT_MAX
            )));
        }
        let description = new.description.trim();
        if description.chars().count() < DESCRIPTION_MIN {
            return Err(TicketError::Invalid(format!(
                "Description must be at least {} characters",
                DESCRIPTION_MIN
            )));
        }

        Ok(Self {
            id: uuid::Uuid::now_v7().to_string(),
            client_profile_id: client_profile_id.to_string(),
            subject: escape_html(subject),
            description: escape_html(description),
            priority: Priority::parse_or_default(new.priority.as_deref()),
            status: TicketStatus::Open,
            assigned_to: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            closed_at: None,
        })
    }

    /// Status a reply moves the ticket to, if any.
    pub fn status_after_reply(&self, author: ReplyAuthor) -> Option<TicketStatus> {
        match (author, self.status) {
            (ReplyAuthor::Client, TicketStatus::WaitingClient) => Some(TicketStatus::InProgress),
            (ReplyAuthor::Staff, TicketStatus::Open) => Some(TicketStatus::InProgress),
            _ => None,
        }
    }

    /// Transition for a new message. Closed tickets take no replies.
    pub fn reply(
        self,
        author: ReplyAuthor,
        author_id: &str,
        body: &str,
        is_internal: bool,
        now: DateTime<Utc>,
    ) -> Result<(Self, TicketMessage), TicketError> {
        if self.status == TicketStatus::Closed {
            return Err(TicketError::InvalidTransition(
                "Ticket is closed, open a new one instead".into(),
            ));
        }
        if is_internal && author != ReplyAuthor::Staff {
            return Err(TicketError::InvalidTransition(
                "Only staff can post internal notes".into(),
            ));
        }
        let body = body.trim();
        if body.is_empty() {
            return Err(TicketError::Invalid("Message cannot be empty".into()));
        }
        if body.chars().count() > MESSAGE_MAX {
            return Err(TicketError::Invalid(format!(
                "Message must be at most {} characters",
                MESSAGE_MAX
            )));
        }

        let message = TicketMessage {
            id: uuid::Uuid::now_v7().to_string(),
            ticket_id: self.id.clone(),
            author_id: author_id.to_string(),
            body: escape_html(body),
            is_internal,
            created_at: now,
        };
        // Internal notes do not count as a reply to the client
        let next = if is_internal {
            None
        } else {
            self.status_after_reply(author)
        };
        let ticket = match next {
            Some(status) => self.with_status(status, now),
            None => Self {
                updated_at: now,
                ..self
            },
        };
        Ok((ticket, message))
    }

    /// Staff status change. `assignee` of `Some(None)` unassigns.
    pub fn update_status(
        self,
        status: TicketStatus,
        assignee: Option<Option<String>>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut ticket = self.with_status(status, now);
        if let Some(assignee) = assignee {
            ticket.assigned_to = assignee;
        }
        ticket
    }

    fn with_status(self, status: TicketStatus, now: DateTime<Utc>) -> Self {
        let entering = status != self.status;
        let resolved_at = match status {
            TicketStatus::Resolved if entering => Some(now),
            TicketStatus::Resolved | TicketStatus::Closed => self.resolved_at,
            _ => None,
        };
        let closed_at = match status {
            TicketStatus::Closed if entering => Some(now),
            TicketStatus::Closed => self.closed_at,
            _ => None,
        };
        Self {
            status,
            resolved_at,
            closed_at,
            updated_at: now,
            ..self
        }
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_ticket(subject: &str, description: &str, priority: Option<&str>) -> NewTicket {
        NewTicket {
            subject: subject.into(),
            description: description.into(),
            priority: priority.map(String::from),
            client_profile_id: None,
        }
    }

    fn ticket() -> Ticket {
        Ticket::open(
            "profile-1",
            &new_ticket("Login broken", "Cannot sign in since Monday", Some("HIGH")),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn open_validates_and_escapes() {
        let t = Ticket::open(
            "p",
            &new_ticket("<b>Urgent</b>", "Page shows \"500\" & nothing else", None),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(t.subject, "&lt;b&gt;Urgent&lt;/b&gt;");
        assert_eq!(t.description, "Page shows &quot;500&quot; &amp; nothing else");
        assert_eq!(t.priority, Priority::Medium);
        assert_eq!(t.status, TicketStatus::Open);
    }

    #[test]
    fn open_rejects_short_fields() {
        assert!(Ticket::open("p", &new_ticket("Hey", "long enough text", None), Utc::now()).is_err());
        assert!(Ticket::open("p", &new_ticket("Valid subject", "short", None), Utc::now()).is_err());
        let long = "s".repeat(SUBJECT_MAX + 1);
        assert!(Ticket::open("p", &new_ticket(&long, "long enough text", None), Utc::now()).is_err());
    }

    #[test]
    fn priority_parsing_is_lenient() {
        assert_eq!(Priority::parse_or_default(Some("Critical")), Priority::Critical);
        assert_eq!(Priority::parse_or_default(Some(" low ")), Priority::Low);
        assert_eq!(Priority::parse_or_default(Some("urgent!!")), Priority::Medium);
        assert_eq!(Priority::parse_or_default(None), Priority::Medium);
        assert_eq!(ticket().priority, Priority::High);
    }

    #[test]
    fn staff_reply_on_open_ticket_starts_work() {
        let (t, msg) = ticket()
            .reply(ReplyAuthor::Staff, "staff-1", "Looking into it", false, Utc::now())
            .unwrap();
        assert_eq!(t.status, TicketStatus::InProgress);
        assert!(!msg.is_internal);
    }

    #[test]
    fn client_reply_while_waiting_resumes_work() {
        let waiting = ticket().update_status(TicketStatus::WaitingClient, None, Utc::now());
        let (t, _) = waiting
            .reply(ReplyAuthor::Client, "client-1", "Here is the log", false, Utc::now())
            .unwrap();
        assert_eq!(t.status, TicketStatus::InProgress);
    }

    #[test]
    fn other_replies_keep_status() {
        let (t, _) = ticket()
            .reply(ReplyAuthor::Client, "client-1", "Any news?", false, Utc::now())
            .unwrap();
        assert_eq!(t.status, TicketStatus::Open);

        let (t, _) = ticket()
            .reply(ReplyAuthor::Staff, "staff-1", "note to self", true, Utc::now())
            .unwrap();
        assert_eq!(t.status, TicketStatus::Open);
    }

    #[test]
    fn internal_notes_are_staff_only() {
        assert!(ticket()
            .reply(ReplyAuthor::Client, "client-1", "secret", true, Utc::now())
            .is_err());
    }

    #[test]
    fn closed_tickets_reject_replies() {
        let closed = ticket().update_status(TicketStatus::Closed, None, Utc::now());
        assert!(matches!(
            closed.reply(ReplyAuthor::Staff, "s", "hello", false, Utc::now()),
            Err(TicketError::InvalidTransition(_))
        ));
    }

    #[test]
    fn status_changes_stamp_resolution_times() {
        let t = ticket();
        let resolved_at = Utc::now();
        let resolved = t.update_status(TicketStatus::Resolved, Some(Some("staff-1".into())), resolved_at);
        assert_eq!(resolved.resolved_at, Some(resolved_at));
        assert_eq!(resolved.assigned_to.as_deref(), Some("staff-1"));

        let closed = resolved.update_status(TicketStatus::Closed, None, Utc::now());
        assert_eq!(closed.resolved_at, Some(resolved_at));
        assert!(closed.closed_at.is_some());
        assert_eq!(closed.assigned_to.as_deref(), Some("staff-1"));

        let reopened = closed.update_status(TicketStatus::InProgress, Some(None), Utc::now());
        assert!(reopened.resolved_at.is_none());
        assert!(reopened.closed_at.is_none());
        assert!(reopened.assigned_to.is_none());
    }

    #[test]
    fn escape_html_covers_quotes() {
        assert_eq!(escape_html("it's <x>"), "it&#039;s &lt;x&gt;");
    }
}
