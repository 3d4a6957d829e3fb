// Repository pattern - isolates project persistence and the audit trail
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::domain::{Project, ProjectStatus, Visibility};
use crate::db::{format_timestamp, get_opt_timestamp, get_timestamp, RepositoryError};
use crate::state::DbPool;

/// One row of the moderation audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct ModerationEvent {
    pub id: i64,
    pub subject_type: String,
    pub subject_id: String,
    pub action: String,
    pub actor_id: String,
    pub notes: Option<String>,
    pub created_at: String,
}

/// Audit entry to append alongside a state change.
#[derive(Debug, Clone)]
pub struct EventRecord<'a> {
    pub subject_type: &'a str,
    pub subject_id: &'a str,
    pub action: &'a str,
    pub actor_id: &'a str,
    pub notes: Option<&'a str>,
}

pub(crate) fn insert_event(conn: &Connection, event: &EventRecord<'_>) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO moderation_events (subject_type, subject_id, action, actor_id, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.subject_type,
            event.subject_id,
            event.action,
            event.actor_id,
            event.notes,
            crate::db::now_rfc3339()
        ],
    )?;
    Ok(())
}

pub(crate) fn list_events(
    pool: &DbPool,
    subject_type: &str,
    subject_id: &str,
) -> Result<Vec<ModerationEvent>, RepositoryError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, subject_type, subject_id, action, actor_id, notes, created_at
         FROM moderation_events WHERE subject_type = ?1 AND subject_id = ?2 ORDER BY id",
    )?;
    let events = stmt
        .query_map(params![subject_type, subject_id], |row| {
            Ok(ModerationEvent {
                id: row.get(0)?,
                subject_type: row.get(1)?,
                subject_id: row.get(2)?,
                action: row.get(3)?,
                actor_id: row.get(4)?,
                notes: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

/// Run `f` inside `BEGIN IMMEDIATE`, committing on success.
pub(crate) fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce() -> Result<T, RepositoryError>,
) -> Result<T, RepositoryError> {
    conn.execute("BEGIN IMMEDIATE", [])?;
    match f() {
        Ok(value) => {
            conn.execute("COMMIT", [])?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute("ROLLBACK", []);
            Err(e)
        }
    }
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn insert(&self, project: &Project) -> Result<(), RepositoryError>;

    async fn load(&self, id: &str) -> Result<Option<Project>, RepositoryError>;

    /// Persist a transition and its audit event atomically. Fails with
    /// `Conflict` when the stored status is no longer `expected`.
    async fn save_transition(
        &self,
        project: &Project,
        expected: ProjectStatus,
        event: &EventRecord<'_>,
    ) -> Result<(), RepositoryError>;

    async fn list_by_status(&self, status: ProjectStatus) -> Result<Vec<Project>, RepositoryError>;

    async fn events(&self, project_id: &str) -> Result<Vec<ModerationEvent>, RepositoryError>;
}

pub struct SqliteProjectRepository {
    pool: DbPool,
}

impl SqliteProjectRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const PROJECT_COLUMNS: &str = "id, client_profile_id, title, description, media_url, status, visibility,
     moderator_id, moderated_at, moderation_notes, created_at, updated_at";

fn project_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    let status: String = row.get(5)?;
    let visibility: String = row.get(6)?;
    Ok(Project {
        id: row.get(0)?,
        client_profile_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        media_url: row.get(4)?,
        status: ProjectStatus::parse(&status).unwrap_or(ProjectStatus::Draft),
        visibility: Visibility::parse(&visibility).unwrap_or(Visibility::Private),
        moderator_id: row.get(7)?,
        moderated_at: get_opt_timestamp(row, 8)?,
        moderation_notes: row.get(9)?,
        created_at: get_timestamp(row, 10)?,
        updated_at: get_timestamp(row, 11)?,
    })
}

fn opt_ts(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(format_timestamp)
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn insert(&self, project: &Project) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO portfolio_projects (id, client_profile_id, title, description, media_url,
                 status, visibility, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                project.id,
                project.client_profile_id,
                project.title,
                project.description,
                project.media_url,
                project.status.as_str(),
                project.visibility.as_str(),
                format_timestamp(project.created_at),
                format_timestamp(project.updated_at),
            ],
        )?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Project>, RepositoryError> {
        let conn = self.pool.get()?;
        let project = conn
            .query_row(
                &format!("SELECT {} FROM portfolio_projects WHERE id = ?1", PROJECT_COLUMNS),
                params![id],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    async fn save_transition(
        &self,
        project: &Project,
        expected: ProjectStatus,
        event: &EventRecord<'_>,
    ) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;

        in_transaction(&conn, || {
            let rows = conn.execute(
                "UPDATE portfolio_projects SET
                   status = ?1, visibility = ?2, moderator_id = ?3, moderated_at = ?4,
                   moderation_notes = ?5, updated_at = ?6
                 WHERE id = ?7 AND status = ?8",
                params![
                    project.status.as_str(),
                    project.visibility.as_str(),
                    project.moderator_id,
                    opt_ts(project.moderated_at),
                    project.moderation_notes,
                    format_timestamp(project.updated_at),
                    project.id,
                    expected.as_str(),
                ],
            )?;
            if rows == 0 {
                return Err(RepositoryError::Conflict(format!(
                    "Project {} changed concurrently",
                    project.id
                )));
            }
            insert_event(&conn, event)?;
            Ok(())
        })
    }

    async fn list_by_status(&self, status: ProjectStatus) -> Result<Vec<Project>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM portfolio_projects WHERE status = ?1 ORDER BY updated_at, id",
            PROJECT_COLUMNS
        ))?;
        let projects = stmt
            .query_map(params![status.as_str()], project_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    async fn events(&self, project_id: &str) -> Result<Vec<ModerationEvent>, RepositoryError> {
        list_events(&self.pool, "portfolio_project", project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{insert_client, insert_user, test_db};
    use crate::moderation::domain::{ModerationAction, NewProject};
    use tempfile::TempDir;

    fn setup() -> (SqliteProjectRepository, DbPool, String, TempDir) {
        let (pool, tmp) = test_db();
        let (_user, profile) = insert_client(&pool, "acme");
        (SqliteProjectRepository::new(pool.clone()), pool, profile, tmp)
    }

    fn draft(profile: &str) -> Project {
        Project::draft(
            profile,
            NewProject {
                title: "Brand refresh".into(),
                description: "Logo and palette".into(),
                media_url: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn event<'a>(id: &'a str, action: &'a str, actor: &'a str) -> EventRecord<'a> {
        EventRecord {
            subject_type: "portfolio_project",
            subject_id: id,
            action,
            actor_id: actor,
            notes: None,
        }
    }

    #[tokio::test]
    async fn insert_and_load() {
        let (repo, _pool, profile, _tmp) = setup();
        let project = draft(&profile);
        repo.insert(&project).await.unwrap();

        let loaded = repo.load(&project.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Brand refresh");
        assert_eq!(loaded.status, ProjectStatus::Draft);
        assert!(repo.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transition_persists_with_event() {
        let (repo, pool, profile, _tmp) = setup();
        let moderator = insert_user(&pool, "mod", "employee");
        let project = draft(&profile);
        repo.insert(&project).await.unwrap();

        let pending = project.submit(Utc::now()).unwrap();
        repo.save_transition(&pending, ProjectStatus::Draft, &event(&pending.id, "submit", "owner"))
            .await
            .unwrap();

        let published = pending
            .moderate(ModerationAction::Approve, &moderator, None, Utc::now())
            .unwrap();
        repo.save_transition(
            &published,
            ProjectStatus::Pending,
            &event(&published.id, "approve", &moderator),
        )
        .await
        .unwrap();

        let loaded = repo.load(&published.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ProjectStatus::Published);
        assert_eq!(loaded.moderator_id.as_deref(), Some(moderator.as_str()));
        assert!(loaded.moderated_at.is_some());

        let events = repo.events(&published.id).await.unwrap();
        let actions: Vec<&str> = events.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["submit", "approve"]);
    }

    #[tokio::test]
    async fn stale_expected_status_conflicts_and_rolls_back() {
        let (repo, _pool, profile, _tmp) = setup();
        let project = draft(&profile);
        repo.insert(&project).await.unwrap();

        let pending = project.submit(Utc::now()).unwrap();
        let result = repo
            .save_transition(&pending, ProjectStatus::Pending, &event(&pending.id, "submit", "x"))
            .await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));

        assert_eq!(
            repo.load(&pending.id).await.unwrap().unwrap().status,
            ProjectStatus::Draft
        );
        assert!(repo.events(&pending.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_by_status_filters() {
        let (repo, _pool, profile, _tmp) = setup();
        let a = draft(&profile);
        let b = draft(&profile);
        repo.insert(&a).await.unwrap();
        repo.insert(&b).await.unwrap();
        let b = b.submit(Utc::now()).unwrap();
        repo.save_transition(&b, ProjectStatus::Draft, &event(&b.id, "submit", "x"))
            .await
            .unwrap();

        let pending = repo.list_by_status(ProjectStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);
    }
}
