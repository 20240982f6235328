use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("invalid_grant")]
    InvalidGrant,

    #[error("invalid_client")]
    InvalidClient,

    #[error("invalid_scope: {0}")]
    InvalidScope(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("missing_token")]
    MissingToken,

    #[error("invalid_token")]
    InvalidToken,

    #[error("token_expired")]
    TokenExpired,

    #[error("unknown_subject")]
    UnknownSubject,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Maps sqlx errors, turning unique-key violations into conflicts.
    pub fn from_db(err: sqlx::Error, conflict: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ServiceError::Conflict(conflict.to_string())
            }
            _ => ServiceError::Database(err),
        }
    }

    /// True for token validation failures.
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            ServiceError::MissingToken
                | ServiceError::InvalidToken
                | ServiceError::TokenExpired
                | ServiceError::UnknownSubject
        )
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            e @ ServiceError::NotFound(_) => AppError::NotFound(anyhow::anyhow!(e.to_string())),
            ServiceError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            e @ (ServiceError::InvalidGrant | ServiceError::InvalidScope(_)) => {
                AppError::BadRequest(anyhow::anyhow!(e.to_string()))
            }
            e @ (ServiceError::InvalidClient
            | ServiceError::InvalidCredentials
            | ServiceError::MissingToken
            | ServiceError::InvalidToken
            | ServiceError::TokenExpired
            | ServiceError::UnknownSubject) => {
                AppError::Unauthorized(anyhow::anyhow!(e.to_string()))
            }
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::anyhow!(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
