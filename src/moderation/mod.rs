//! Portfolio project moderation: submission, review and visibility.

pub mod domain;
pub mod repository;

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::policy::{authorize, AccessDenied, Action, Actor, Resource};
use crate::db::RepositoryError;
use crate::state::DbPool;

pub use domain::{ModerationAction, NewProject, Project, ProjectStatus, Visibility};
pub use repository::{
    EventRecord, ModerationEvent, ProjectRepository, SqliteProjectRepository,
};

/// Errors from project and comment moderation.
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Denied(#[from] AccessDenied),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Aggregate outcome of a bulk operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkResult {
    pub processed_count: usize,
    pub errors: Vec<String>,
}

impl BulkResult {
    pub fn record<T, E: std::fmt::Display>(&mut self, id: &str, outcome: Result<T, E>) {
        match outcome {
            Ok(_) => self.processed_count += 1,
            Err(e) => self.errors.push(format!("{}: {}", id, e)),
        }
    }
}

/// Project workflow: authorize, apply a pure transition, persist with an audit row.
#[derive(Clone)]
pub struct ProjectWorkflow {
    repo: Arc<dyn ProjectRepository>,
}

impl ProjectWorkflow {
    pub fn new(repo: Arc<dyn ProjectRepository>) -> Self {
        Self { repo }
    }

    pub fn sqlite(pool: DbPool) -> Self {
        Self::new(Arc::new(SqliteProjectRepository::new(pool)))
    }

    /// Missing projects look the same as foreign ones to non-staff callers.
    async fn load_authorized(&self, actor: &Actor, id: &str, action: Action) -> Result<Project, ModerationError> {
        let Some(project) = self.repo.load(id).await? else {
            if actor.is_staff() {
                return Err(ModerationError::NotFound("Project"));
            }
            return Err(AccessDenied.into());
        };
        authorize(
            actor,
            Resource::Project { owner_profile_id: &project.client_profile_id },
            action,
        )?;
        Ok(project)
    }

    /// Clients create drafts under their own profile.
    pub async fn create_project(&self, actor: &Actor, new: NewProject) -> Result<Project, ModerationError> {
        let profile_id = actor.client_profile_id.as_deref().ok_or(AccessDenied)?;
        authorize(actor, Resource::Project { owner_profile_id: profile_id }, Action::Create)?;

        let project = Project::draft(profile_id, new, Utc::now())?;
        self.repo.insert(&project).await?;
        tracing::info!(project_id = %project.id, profile_id, "project draft created");
        Ok(project)
    }

    pub async fn submit_project(&self, actor: &Actor, id: &str) -> Result<Project, ModerationError> {
        let project = self.load_authorized(actor, id, Action::Update).await?;

        let previous = project.status;
        let submitted = project.submit(Utc::now())?;
        self.persist(&submitted, previous, "submit", actor, None).await?;
        tracing::info!(project_id = %id, "project submitted for review");
        Ok(submitted)
    }

    pub async fn moderate_project(
        &self,
        actor: &Actor,
        id: &str,
        action: ModerationAction,
        notes: Option<String>,
    ) -> Result<Project, ModerationError> {
        let project = self.load_authorized(actor, id, Action::Moderate).await?;

        let moderated = project.moderate(action, &actor.user_id, notes, Utc::now())?;
        self.persist(
            &moderated,
            ProjectStatus::Pending,
            action.as_str(),
            actor,
            moderated.moderation_notes.as_deref(),
        )
        .await?;
        tracing::info!(
            project_id = %id,
            moderator = %actor.user_id,
            status = %moderated.status,
            "project moderated"
        );
        Ok(moderated)
    }

    /// Moderate each id independently; one failure never stops the batch.
    pub async fn bulk_moderate(
        &self,
        actor: &Actor,
        ids: &[String],
        action: ModerationAction,
        notes: Option<String>,
    ) -> Result<BulkResult, ModerationError> {
        authorize(actor, Resource::ModerationQueue, Action::Moderate)?;

        let mut result = BulkResult::default();
        for id in ids {
            let outcome = self.moderate_project(actor, id, action, notes.clone()).await;
            if let Err(e) = &outcome {
                tracing::warn!(project_id = %id, "bulk moderation item failed: {}", e);
            }
            result.record(id, outcome);
        }
        tracing::info!(
            processed = result.processed_count,
            failed = result.errors.len(),
            "bulk project moderation finished"
        );
        Ok(result)
    }

    pub async fn toggle_visibility(&self, actor: &Actor, id: &str) -> Result<Project, ModerationError> {
        let project = self.load_authorized(actor, id, Action::Update).await?;

        let toggled = project.toggle_visibility(Utc::now())?;
        let action = match toggled.visibility {
            Visibility::Public => "make_public",
            Visibility::Private => "make_private",
        };
        self.persist(&toggled, ProjectStatus::Published, action, actor, None)
            .await?;
        Ok(toggled)
    }

    pub async fn list_pending_projects(&self, actor: &Actor) -> Result<Vec<Project>, ModerationError> {
        authorize(actor, Resource::ModerationQueue, Action::Read)?;
        Ok(self.repo.list_by_status(ProjectStatus::Pending).await?)
    }

    pub async fn history(&self, actor: &Actor, id: &str) -> Result<Vec<ModerationEvent>, ModerationError> {
        let project = self.load_authorized(actor, id, Action::Read).await?;
        Ok(self.repo.events(id).await?)
    }

    async fn persist(
        &self,
        project: &Project,
        expected: ProjectStatus,
        action: &str,
        actor: &Actor,
        notes: Option<&str>,
    ) -> Result<(), ModerationError> {
        let event = EventRecord {
            subject_type: "portfolio_project",
            subject_id: &project.id,
            action,
            actor_id: &actor.user_id,
            notes,
        };
        match self.repo.save_transition(project, expected, &event).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::Conflict(_)) => Err(ModerationError::InvalidTransition(
                "Project was changed by someone else, reload and try again".into(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}
