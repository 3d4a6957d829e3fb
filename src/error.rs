use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::policy::AccessDenied;
use crate::backup::BackupError;
use crate::db::RepositoryError;
use crate::moderation::ModerationError;
use crate::notify::MailError;
use crate::tickets::TicketError;

const SERVER_ERROR: &str = "Server error occurred";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Access denied")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl From<AccessDenied> for AppError {
    fn from(_: AccessDenied) -> Self {
        AppError::Forbidden
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => AppError::Pool(e),
            RepositoryError::Sql(e) => AppError::Database(e),
            RepositoryError::NotFound(_) => AppError::NotFound,
            RepositoryError::Conflict(msg) => AppError::Conflict(msg),
            RepositoryError::Invalid(msg) => AppError::BadRequest(msg),
        }
    }
}

impl From<ModerationError> for AppError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::InvalidTransition(msg) => AppError::Conflict(msg),
            ModerationError::Invalid(msg) => AppError::BadRequest(msg),
            ModerationError::NotFound(_) => AppError::NotFound,
            ModerationError::Denied(_) => AppError::Forbidden,
            ModerationError::Repository(e) => e.into(),
        }
    }
}

impl From<TicketError> for AppError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::Invalid(msg) => AppError::BadRequest(msg),
            TicketError::InvalidTransition(msg) => AppError::Conflict(msg),
            TicketError::NotFound => AppError::NotFound,
            TicketError::Denied(_) => AppError::Forbidden,
            TicketError::Repository(e) => e.into(),
        }
    }
}

impl From<BackupError> for AppError {
    fn from(err: BackupError) -> Self {
        match err {
            BackupError::InvalidFilename => AppError::BadRequest("Invalid backup filename".into()),
            e @ BackupError::StructureOnly => AppError::BadRequest(e.to_string()),
            BackupError::NotFound => AppError::NotFound,
            BackupError::Locked => AppError::Conflict("Backup already in progress".into()),
            e @ (BackupError::ChecksumMismatch(_) | BackupError::MissingChecksum(_)) => {
                AppError::Conflict(e.to_string())
            }
            BackupError::Database(e) => AppError::Pool(e),
            BackupError::Sql(e) => AppError::Database(e),
            BackupError::Io(e) => AppError::Io(e),
            BackupError::Settings(e) => e.into(),
            BackupError::Task(e) => AppError::TaskJoin(e),
            e @ (BackupError::NoTables | BackupError::DirectoryNotWritable(_)) => {
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid credentials".to_string(),
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.to_string())
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.to_string())
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.to_string())
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.to_string())
            }
            AppError::TaskJoin(e) => {
                tracing::error!("Task join error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.to_string())
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
