//! Comments on articles and published projects.

pub mod domain;
pub mod repository;

use chrono::Utc;
use std::sync::Arc;

use crate::auth::policy::{authorize, Action, Actor, Resource};
use crate::moderation::{BulkResult, EventRecord, ModerationError};
use crate::state::DbPool;

pub use domain::{Comment, CommentAction, CommentStatus, NewComment, TargetType};
pub use repository::{CommentRepository, SqliteCommentRepository};

#[derive(Clone)]
pub struct CommentWorkflow {
    repo: Arc<dyn CommentRepository>,
}

impl CommentWorkflow {
    pub fn new(repo: Arc<dyn CommentRepository>) -> Self {
        Self { repo }
    }

    pub fn sqlite(pool: DbPool) -> Self {
        Self::new(Arc::new(SqliteCommentRepository::new(pool)))
    }

    async fn load(&self, id: &str) -> Result<Comment, ModerationError> {
        self.repo
            .load(id)
            .await?
            .ok_or(ModerationError::NotFound("Comment"))
    }

    pub async fn create_comment(&self, actor: &Actor, new: NewComment) -> Result<Comment, ModerationError> {
        authorize(actor, Resource::Comment { author_id: &actor.user_id }, Action::Create)?;

        if !self.repo.target_open(new.target_type, &new.target_id).await? {
            return Err(ModerationError::NotFound("Comment target"));
        }

        let parent = match new.parent_id.as_deref() {
            Some(parent_id) => self.repo.load(parent_id).await?,
            None => None,
        };
        let comment = Comment::compose(actor, new, parent.as_ref(), Utc::now())?;
        self.repo.insert(&comment).await?;

        tracing::info!(
            comment_id = %comment.id,
            target = %comment.target_type,
            target_id = %comment.target_id,
            approved = comment.is_approved,
            "comment created"
        );
        Ok(comment)
    }

    pub async fn moderate_comment(
        &self,
        actor: &Actor,
        id: &str,
        action: CommentAction,
    ) -> Result<Comment, ModerationError> {
        let comment = self.load(id).await?;
        authorize(actor, Resource::Comment { author_id: &comment.author_id }, Action::Moderate)?;

        let moderated = comment.moderate(action, &actor.user_id, Utc::now())?;
        self.repo
            .save(
                &moderated,
                &EventRecord {
                    subject_type: "comment",
                    subject_id: &moderated.id,
                    action: action.as_str(),
                    actor_id: &actor.user_id,
                    notes: None,
                },
            )
            .await?;
        tracing::info!(comment_id = %id, action = action.as_str(), "comment moderated");
        Ok(moderated)
    }

    pub async fn bulk_moderate_comments(
        &self,
        actor: &Actor,
        ids: &[String],
        action: CommentAction,
    ) -> Result<BulkResult, ModerationError> {
        authorize(actor, Resource::ModerationQueue, Action::Moderate)?;

        let mut result = BulkResult::default();
        for id in ids {
            let outcome = self.moderate_comment(actor, id, action).await;
            if let Err(e) = &outcome {
                tracing::warn!(comment_id = %id, "bulk comment moderation item failed: {}", e);
            }
            result.record(id, outcome);
        }
        Ok(result)
    }

    /// Authors and staff may delete; the row is kept and marked deleted.
    pub async fn soft_delete_comment(&self, actor: &Actor, id: &str) -> Result<Comment, ModerationError> {
        let comment = self.load(id).await?;
        authorize(actor, Resource::Comment { author_id: &comment.author_id }, Action::Delete)?;

        let deleted = comment.soft_delete(Utc::now())?;
        self.repo
            .save(
                &deleted,
                &EventRecord {
                    subject_type: "comment",
                    subject_id: &deleted.id,
                    action: "delete",
                    actor_id: &actor.user_id,
                    notes: None,
                },
            )
            .await?;
        tracing::info!(comment_id = %id, by = %actor.user_id, "comment deleted");
        Ok(deleted)
    }

    /// Staff see pending comments too; everyone else only approved ones.
    pub async fn list_comments(
        &self,
        viewer: Option<&Actor>,
        target_type: TargetType,
        target_id: &str,
    ) -> Result<Vec<Comment>, ModerationError> {
        let staff = viewer.is_some_and(Actor::is_staff);
        Ok(self
            .repo
            .list_for_target(target_type, target_id, !staff)
            .await?)
    }
}
