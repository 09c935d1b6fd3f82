use service_core::error::AppError;
use thiserror::Error;

use super::jwt::TokenError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Could not validate credentials")]
    InvalidSignature,

    #[error("Session is no longer valid")]
    SessionRevoked,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ServiceError::TokenExpired,
            TokenError::InvalidSignature => ServiceError::InvalidSignature,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            e @ (ServiceError::InvalidCredentials
            | ServiceError::TokenExpired
            | ServiceError::InvalidSignature
            | ServiceError::SessionRevoked) => AppError::Unauthorized(anyhow::anyhow!(e.to_string())),
            ServiceError::Forbidden(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            // Duplicate names and handles have always been reported as 400
            ServiceError::Conflict(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
        }
    }
}
