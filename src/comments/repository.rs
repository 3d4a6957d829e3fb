use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use super::domain::{Comment, CommentStatus, TargetType};
use crate::db::{format_timestamp, get_opt_timestamp, get_timestamp, RepositoryError};
use crate::moderation::repository::{in_transaction, insert_event, list_events, EventRecord};
use crate::moderation::ModerationEvent;
use crate::state::DbPool;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn insert(&self, comment: &Comment) -> Result<(), RepositoryError>;

    async fn load(&self, id: &str) -> Result<Option<Comment>, RepositoryError>;

    /// Write moderation/deletion fields and the audit event in one transaction.
    async fn save(&self, comment: &Comment, event: &EventRecord<'_>) -> Result<(), RepositoryError>;

    /// Non-deleted comments on a target, oldest first. `approved_only` hides pending ones.
    async fn list_for_target(
        &self,
        target_type: TargetType,
        target_id: &str,
        approved_only: bool,
    ) -> Result<Vec<Comment>, RepositoryError>;

    /// Whether the target accepts comments: any article, or a published project.
    async fn target_open(&self, target_type: TargetType, target_id: &str) -> Result<bool, RepositoryError>;

    async fn events(&self, comment_id: &str) -> Result<Vec<ModerationEvent>, RepositoryError>;
}

pub struct SqliteCommentRepository {
    pool: DbPool,
}

impl SqliteCommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const COMMENT_COLUMNS: &str = "id, target_type, target_id, author_id, parent_id, content, is_approved,
     status, deleted_at, moderator_id, moderated_at, created_at";

fn comment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    let target_type: String = row.get(1)?;
    let status: String = row.get(7)?;
    Ok(Comment {
        id: row.get(0)?,
        target_type: TargetType::parse(&target_type).unwrap_or(TargetType::Article),
        target_id: row.get(2)?,
        author_id: row.get(3)?,
        parent_id: row.get(4)?,
        content: row.get(5)?,
        is_approved: row.get(6)?,
        status: if status == "deleted" {
            CommentStatus::Deleted
        } else {
            CommentStatus::Active
        },
        deleted_at: get_opt_timestamp(row, 8)?,
        moderator_id: row.get(9)?,
        moderated_at: get_opt_timestamp(row, 10)?,
        created_at: get_timestamp(row, 11)?,
    })
}

#[async_trait]
impl CommentRepository for SqliteCommentRepository {
    async fn insert(&self, comment: &Comment) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO comments (id, target_type, target_id, author_id, parent_id, content,
                 is_approved, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                comment.id,
                comment.target_type.as_str(),
                comment.target_id,
                comment.author_id,
                comment.parent_id,
                comment.content,
                comment.is_approved,
                comment.status.as_str(),
                format_timestamp(comment.created_at),
            ],
        )?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Comment>, RepositoryError> {
        let conn = self.pool.get()?;
        let comment = conn
            .query_row(
                &format!("SELECT {} FROM comments WHERE id = ?1", COMMENT_COLUMNS),
                params![id],
                comment_from_row,
            )
            .optional()?;
        Ok(comment)
    }

    async fn save(&self, comment: &Comment, event: &EventRecord<'_>) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        in_transaction(&conn, || {
            let rows = conn.execute(
                "UPDATE comments SET is_approved = ?1, status = ?2, deleted_at = ?3,
                   moderator_id = ?4, moderated_at = ?5
                 WHERE id = ?6",
                params![
                    comment.is_approved,
                    comment.status.as_str(),
                    comment.deleted_at.map(format_timestamp),
                    comment.moderator_id,
                    comment.moderated_at.map(format_timestamp),
                    comment.id,
                ],
            )?;
            if rows == 0 {
                return Err(RepositoryError::NotFound(format!("comment {}", comment.id)));
            }
            insert_event(&conn, event)?;
            Ok(())
        })
    }

    async fn list_for_target(
        &self,
        target_type: TargetType,
        target_id: &str,
        approved_only: bool,
    ) -> Result<Vec<Comment>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM comments
             WHERE target_type = ?1 AND target_id = ?2 AND status = 'active'
               AND (?3 = 0 OR is_approved = 1)
             ORDER BY created_at, id",
            COMMENT_COLUMNS
        ))?;
        let comments = stmt
            .query_map(
                params![target_type.as_str(), target_id, approved_only],
                comment_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn target_open(&self, target_type: TargetType, target_id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = match target_type {
            TargetType::Article => "SELECT COUNT(*) > 0 FROM articles WHERE id = ?1",
            TargetType::PortfolioProject => {
                "SELECT COUNT(*) > 0 FROM portfolio_projects WHERE id = ?1 AND status = 'published'"
            }
        };
        let open: bool = conn.query_row(sql, params![target_id], |row| row.get(0))?;
        Ok(open)
    }

    async fn events(&self, comment_id: &str) -> Result<Vec<ModerationEvent>, RepositoryError> {
        list_events(&self.pool, "comment", comment_id)
    }
}
