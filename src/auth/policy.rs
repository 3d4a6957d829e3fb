//! Single authorization check used by every handler.
//!
//! Handlers build an [`Actor`] from the request, describe what they are about
//! to touch as a [`Resource`], and call [`authorize`] once before doing any
//! work.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Employee,
    Client,
    User,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "employee" => Some(Self::Employee),
            "client" => Some(Self::Client),
            "user" => Some(Self::User),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Employee => "employee",
            Self::Client => "client",
            Self::User => "user",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::Employee)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
    /// Set for users that own a client profile.
    pub client_profile_id: Option<String>,
}

impl Actor {
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    fn owns_profile(&self, profile_id: &str) -> bool {
        self.client_profile_id.as_deref() == Some(profile_id)
    }
}

/// What is being touched. Ownership fields carry the ids needed to decide.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Backup,
    Settings,
    /// A portfolio project, identified by its owning client profile.
    Project { owner_profile_id: &'a str },
    /// A comment, identified by its author.
    Comment { author_id: &'a str },
    /// A support ticket, identified by its owning client profile.
    Ticket { owner_profile_id: &'a str },
    /// Staff-only notes on a ticket.
    TicketInternal,
    /// Review queues and bulk moderation.
    ModerationQueue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Moderate,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Access denied")]
pub struct AccessDenied;

pub fn authorize(actor: &Actor, resource: Resource<'_>, action: Action) -> Result<(), AccessDenied> {
    let allowed = match resource {
        Resource::Backup | Resource::Settings => actor.role == Role::Admin,

        Resource::Project { owner_profile_id } => match action {
            Action::Moderate => actor.is_staff(),
            _ => actor.is_staff() || actor.owns_profile(owner_profile_id),
        },

        Resource::Comment { author_id } => match action {
            Action::Read | Action::Create => true,
            Action::Moderate => actor.is_staff(),
            Action::Update | Action::Delete => actor.is_staff() || actor.user_id == author_id,
        },

        Resource::Ticket { owner_profile_id } => match action {
            Action::Create => {
                actor.is_staff()
                    || (actor.role == Role::Client && actor.owns_profile(owner_profile_id))
            }
            // Replying counts as an update
            Action::Read | Action::Update => {
                actor.is_staff() || actor.owns_profile(owner_profile_id)
            }
            Action::Moderate | Action::Delete => actor.is_staff(),
        },

        Resource::TicketInternal | Resource::ModerationQueue => actor.is_staff(),
    };

    if allowed {
        Ok(())
    } else {
        tracing::debug!(
            user_id = %actor.user_id,
            role = %actor.role,
            ?resource,
            ?action,
            "authorization denied"
        );
        Err(AccessDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role, profile: Option<&str>) -> Actor {
        Actor {
            user_id: format!("{}-user", role),
            role,
            client_profile_id: profile.map(String::from),
        }
    }

    #[test]
    fn only_admins_touch_backups_and_settings() {
        assert!(authorize(&actor(Role::Admin, None), Resource::Backup, Action::Create).is_ok());
        assert!(authorize(&actor(Role::Employee, None), Resource::Backup, Action::Read).is_err());
        assert!(authorize(&actor(Role::Client, Some("c1")), Resource::Settings, Action::Update).is_err());
    }

    #[test]
    fn clients_cannot_reach_other_clients_tickets() {
        let client = actor(Role::Client, Some("c1"));
        let mine = Resource::Ticket { owner_profile_id: "c1" };
        let theirs = Resource::Ticket { owner_profile_id: "c2" };

        assert!(authorize(&client, mine, Action::Read).is_ok());
        assert!(authorize(&client, mine, Action::Update).is_ok());
        assert!(authorize(&client, theirs, Action::Read).is_err());
        assert!(authorize(&client, theirs, Action::Update).is_err());
        assert!(authorize(&client, mine, Action::Moderate).is_err());
    }

    #[test]
    fn staff_reach_every_ticket() {
        let ticket = Resource::Ticket { owner_profile_id: "c9" };
        for role in [Role::Admin, Role::Employee] {
            let staff = actor(role, None);
            assert!(authorize(&staff, ticket, Action::Read).is_ok());
            assert!(authorize(&staff, ticket, Action::Moderate).is_ok());
            assert!(authorize(&staff, Resource::TicketInternal, Action::Create).is_ok());
        }
    }

    #[test]
    fn plain_users_cannot_open_tickets() {
        let user = actor(Role::User, None);
        let ticket = Resource::Ticket { owner_profile_id: "c1" };
        assert!(authorize(&user, ticket, Action::Create).is_err());
        assert!(authorize(&user, Resource::TicketInternal, Action::Create).is_err());
    }

    #[test]
    fn project_moderation_is_staff_only() {
        let project = Resource::Project { owner_profile_id: "c1" };
        assert!(authorize(&actor(Role::Employee, None), project, Action::Moderate).is_ok());
        assert!(authorize(&actor(Role::Client, Some("c1")), project, Action::Moderate).is_err());
        assert!(authorize(&actor(Role::Client, Some("c1")), project, Action::Update).is_ok());
        assert!(authorize(&actor(Role::Client, Some("c2")), project, Action::Update).is_err());
    }

    #[test]
    fn moderation_queue_is_staff_only() {
        assert!(authorize(&actor(Role::Admin, None), Resource::ModerationQueue, Action::Read).is_ok());
        assert!(authorize(&actor(Role::Employee, None), Resource::ModerationQueue, Action::Moderate).is_ok());
        assert!(authorize(&actor(Role::Client, Some("c1")), Resource::ModerationQueue, Action::Read).is_err());
        assert!(authorize(&actor(Role::User, None), Resource::ModerationQueue, Action::Moderate).is_err());
    }

    #[test]
    fn comment_authors_may_delete_their_own() {
        let author = Actor {
            user_id: "u1".into(),
            role: Role::User,
            client_profile_id: None,
        };
        assert!(authorize(&author, Resource::Comment { author_id: "u1" }, Action::Delete).is_ok());
        assert!(authorize(&author, Resource::Comment { author_id: "u2" }, Action::Delete).is_err());
        assert!(authorize(&author, Resource::Comment { author_id: "u1" }, Action::Moderate).is_err());
    }

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::Admin, Role::Employee, Role::Client, Role::User] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("root"), None);
    }
}
