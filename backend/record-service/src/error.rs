/// Error types for Record Service
///
/// Only repository outcomes surface here. Cache and publisher failures are
/// reported through `crate::degradation` and never reach the caller.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;
use uuid::Uuid;

/// Result type for record-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// No live record with this identifier
    #[error("Record not found: {0}")]
    NotFound(Uuid),

    /// Input rejected before reaching the repository
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Relational storage failed; surfaced verbatim
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::StorageFailure(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::StorageFailure(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::StorageFailure(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}
