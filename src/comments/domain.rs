// Domain types - threaded comments with approval and soft delete
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::policy::Actor;
use crate::moderation::ModerationError;

pub const MAX_CONTENT_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Article,
    PortfolioProject,
}

impl TargetType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "article" => Some(Self::Article),
            "portfolio_project" => Some(Self::PortfolioProject),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::PortfolioProject => "portfolio_project",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    Active,
    Deleted,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentAction {
    Approve,
    Unapprove,
}

impl CommentAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Some(Self::Approve),
            "unapprove" | "reject" => Some(Self::Unapprove),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Unapprove => "unapprove",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub target_type: TargetType,
    pub target_id: String,
    pub parent_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: String,
    pub target_type: TargetType,
    pub target_id: String,
    pub author_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub is_approved: bool,
    pub status: CommentStatus,
    pub deleted_at: Option<DateTime<Utc>>,
    pub moderator_id: Option<String>,
    pub moderated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Build a comment, enforcing the reply invariant against `parent`.
    ///
    /// Staff comments are approved on creation; everyone else waits for review.
    pub fn compose(
        author: &Actor,
        new: NewComment,
        parent: Option<&Comment>,
        now: DateTime<Utc>,
    ) -> Result<Self, ModerationError> {
        let content = new.content.trim();
        if content.is_empty() {
            return Err(ModerationError::Invalid("Comment cannot be empty".into()));
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(ModerationError::Invalid(format!(
                "Comment must be at most {} characters",
                MAX_CONTENT_CHARS
            )));
        }

        match (new.parent_id.as_deref(), parent) {
            (None, _) => {}
            (Some(_), None) => return Err(ModerationError::NotFound("Parent comment")),
            (Some(parent_id), Some(parent)) => {
                if parent.id != parent_id || !parent.accepts_reply_on(new.target_type, &new.target_id) {
                    return Err(ModerationError::Invalid(
                        "Replies must target an approved comment on the same item".into(),
                    ));
                }
            }
        }

        Ok(Self {
            id: uuid::Uuid::now_v7().to_string(),
            target_type: new.target_type,
            target_id: new.target_id,
            author_id: author.user_id.clone(),
            parent_id: new.parent_id,
            content: content.to_string(),
            is_approved: author.is_staff(),
            status: CommentStatus::Active,
            deleted_at: None,
            moderator_id: None,
            moderated_at: None,
            created_at: now,
        })
    }

    pub fn accepts_reply_on(&self, target_type: TargetType, target_id: &str) -> bool {
        self.target_type == target_type
            && self.target_id == target_id
            && self.is_public()
    }

    pub fn moderate(
        self,
        action: CommentAction,
        moderator_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, ModerationError> {
        if self.status == CommentStatus::Deleted {
            return Err(ModerationError::InvalidTransition(
                "Deleted comments cannot be moderated".into(),
            ));
        }
        Ok(Self {
            is_approved: action == CommentAction::Approve,
            moderator_id: Some(moderator_id.to_string()),
            moderated_at: Some(now),
            ..self
        })
    }

    /// Mark deleted; the row stays so replies keep their parent.
    pub fn soft_delete(self, now: DateTime<Utc>) -> Result<Self, ModerationError> {
        if self.status == CommentStatus::Deleted {
            return Err(ModerationError::InvalidTransition(
                "Comment is already deleted".into(),
            ));
        }
        Ok(Self {
            status: CommentStatus::Deleted,
            deleted_at: Some(now),
            ..self
        })
    }

    pub fn is_public(&self) -> bool {
        self.is_approved && self.status == CommentStatus::Active
    }
}
