// Domain types - pure project moderation transitions, no I/O
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ModerationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Pending,
    Published,
    Rejected,
}

impl ProjectStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "published" => Some(Self::Published),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Published => "published",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Public,
}

impl Visibility {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Self::Private),
            "public" => Some(Self::Public),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Self::Private => Self::Public,
            Self::Public => Self::Private,
        }
    }
}

/// What a moderator decides about a pending project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl ModerationAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "publish" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }

    pub fn resulting_status(&self) -> ProjectStatus {
        match self {
            Self::Approve => ProjectStatus::Published,
            Self::Reject => ProjectStatus::Rejected,
        }
    }
}

/// Fields a client supplies when creating a project.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub media_url: Option<String>,
}

impl NewProject {
    pub fn validate(&self) -> Result<(), ModerationError> {
        let title = self.title.trim().chars().count();
        if !(3..=255).contains(&title) {
            return Err(ModerationError::Invalid(
                "Title must be between 3 and 255 characters".into(),
            ));
        }
        if self.description.trim().is_empty() {
            return Err(ModerationError::Invalid("Description is required".into()));
        }
        if let Some(url) = self.media_url.as_deref().map(str::trim) {
            if !url.is_empty() && !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ModerationError::Invalid(
                    "Media URL must be an http(s) link".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: String,
    pub client_profile_id: String,
    pub title: String,
    pub description: String,
    pub media_url: Option<String>,
    pub status: ProjectStatus,
    pub visibility: Visibility,
    pub moderator_id: Option<String>,
    pub moderated_at: Option<DateTime<Utc>>,
    pub moderation_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pure state transitions. Each consumes the project and returns the next one.
impl Project {
    /// A fresh private draft.
    pub fn draft(client_profile_id: &str, new: NewProject, now: DateTime<Utc>) -> Result<Self, ModerationError> {
        new.validate()?;
        Ok(Self {
            id: uuid::Uuid::now_v7().to_string(),
            client_profile_id: client_profile_id.to_string(),
            title: new.title.trim().to_string(),
            description: new.description.trim().to_string(),
            media_url: new
                .media_url
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            status: ProjectStatus::Draft,
            visibility: Visibility::Private,
            moderator_id: None,
            moderated_at: None,
            moderation_notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Transition: draft | rejected -> pending. Starts a new review cycle.
    pub fn submit(self, now: DateTime<Utc>) -> Result<Self, ModerationError> {
        match self.status {
            ProjectStatus::Draft | ProjectStatus::Rejected => Ok(Self {
                status: ProjectStatus::Pending,
                visibility: Visibility::Private,
                updated_at: now,
                ..self
            }),
            other => Err(ModerationError::InvalidTransition(format!(
                "Cannot submit a {} project",
                other
            ))),
        }
    }

    /// Transition: pending -> published | rejected.
    pub fn moderate(
        self,
        action: ModerationAction,
        moderator_id: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, ModerationError> {
        if self.status != ProjectStatus::Pending {
            return Err(ModerationError::InvalidTransition(format!(
                "Project is {}, only pending projects can be moderated",
                self.status
            )));
        }
        Ok(Self {
            status: action.resulting_status(),
            visibility: Visibility::Private,
            moderator_id: Some(moderator_id.to_string()),
            moderated_at: Some(now),
            moderation_notes: notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            updated_at: now,
            ..self
        })
    }

    /// Flip private <-> public. Published projects only.
    pub fn toggle_visibility(self, now: DateTime<Utc>) -> Result<Self, ModerationError> {
        if self.status != ProjectStatus::Published {
            return Err(ModerationError::InvalidTransition(
                "Only published projects can change visibility".into(),
            ));
        }
        Ok(Self {
            visibility: self.visibility.flipped(),
            updated_at: now,
            ..self
        })
    }
}
