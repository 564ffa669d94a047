use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Failures of the token issuance flow.
///
/// Each variant maps onto an OAuth2 error code via [`TokenError::error_code`].
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("The application cannot be found")]
    InvalidClient,
    #[error("The user cannot be found")]
    InvalidUser,
    #[error("The username or password is invalid")]
    InvalidCredentials,
    #[error("The user has no roles assigned")]
    NoRolesAssigned,
    #[error("The refresh token is no longer valid")]
    InvalidRefreshToken,
    #[error("The token request was cancelled")]
    Cancelled,
    #[error("Store error: {0}")]
    Store(#[from] DbErr),
}

impl TokenError {
    /// OAuth2 `error` value (RFC 6749 section 5.2) for this failure.
    pub fn error_code(&self) -> &'static str {
        match self {
            TokenError::InvalidClient => "invalid_client",
            TokenError::InvalidUser
            | TokenError::InvalidCredentials
            | TokenError::NoRolesAssigned
            | TokenError::InvalidRefreshToken => "invalid_grant",
            TokenError::Cancelled => "temporarily_unavailable",
            TokenError::Store(_) => "server_error",
        }
    }
}

/// Failures of the clinic-management services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    /// Like `From<DbErr>`, but a unique-index violation becomes `Conflict(message)`.
    pub fn unique(err: DbErr, message: impl Into<String>) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(message.into()),
            _ => ServiceError::Database(err),
        }
    }
}

impl From<argon2::password_hash::Error> for ServiceError {
    fn from(e: argon2::password_hash::Error) -> Self {
        ServiceError::PasswordHash(e.to_string())
    }
}
