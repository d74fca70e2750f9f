//! Caller-facing error taxonomy.
//!
//! Handlers map a [`CoreError`] to one response; the repository and token
//! layers keep their own richer errors and convert at this boundary.

use crate::auth::TokenError;
use crate::db::DbError;
use crate::repo::RepoError;
use log::error;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity absent, or filtered out by a status predicate. The two causes are
    /// deliberately indistinguishable for articles.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    /// Missing, malformed, tampered or expired credentials.
    #[error("authentication required")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    /// Store, cache or signing failure not attributable to caller input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// HTTP status a handler should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Unauthenticated => 401,
            Self::Forbidden(_) => 403,
            Self::Conflict(_) => 409,
            Self::Validation(_) => 400,
            Self::Internal(_) => 500,
        }
    }
}

impl From<RepoError> for CoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Conflict(message) => Self::Conflict(message),
            RepoError::InvalidReference(message) => Self::Validation(message),
            other => {
                error!("event=repo_failure module=error status=error error={other}");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<DbError> for CoreError {
    fn from(value: DbError) -> Self {
        error!("event=db_failure module=error status=error error={value}");
        Self::Internal(value.to_string())
    }
}

impl From<bcrypt::BcryptError> for CoreError {
    fn from(value: bcrypt::BcryptError) -> Self {
        error!("event=password_hash module=error status=error error={value}");
        Self::Internal("failed to hash password".to_string())
    }
}

impl From<TokenError> for CoreError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Signing(message) => {
                error!("event=token_signing module=error status=error error={message}");
                Self::Internal("failed to sign token".to_string())
            }
            _ => Self::Unauthenticated,
        }
    }
}
