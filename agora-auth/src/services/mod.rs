pub mod accounts;
pub mod authenticator;
pub mod oauth;
pub mod password;
pub mod session;

use agora_shared::errors::{AppError, ErrorCode};

use crate::store::{StoreError, UniqueField};

/// Failure taxonomy of the identity core.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("not found")]
    NotFound,

    #[error("session expired")]
    Expired,

    #[error("oauth state mismatch")]
    StateMismatch,

    #[error("{0} already exists")]
    AlreadyExists(UniqueField),

    #[error("account is banned")]
    Banned,

    #[error("no account for this identity, please register first")]
    IdentityNotFound,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    WeakPassword(String),

    #[error("identity provider failure: {0}")]
    Upstream(String),

    #[error(transparent)]
    Store(StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(field) => AuthError::AlreadyExists(field),
            other => AuthError::Store(other),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let code = match &err {
            AuthError::NotFound => ErrorCode::NotFound,
            AuthError::IdentityNotFound => ErrorCode::IdentityNotFound,
            AuthError::Expired => ErrorCode::SessionExpired,
            AuthError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AuthError::StateMismatch => ErrorCode::OAuthStateMismatch,
            AuthError::AlreadyExists(UniqueField::Email) => ErrorCode::EmailAlreadyExists,
            AuthError::AlreadyExists(UniqueField::Username) => ErrorCode::UsernameTaken,
            AuthError::Banned => ErrorCode::UserBanned,
            AuthError::Upstream(_) => ErrorCode::OAuthError,
            AuthError::Validation(_) => ErrorCode::ValidationError,
            AuthError::WeakPassword(_) => ErrorCode::PasswordTooWeak,
            AuthError::Store(_) | AuthError::Internal(_) => ErrorCode::InternalError,
        };
        AppError::new(code, err.to_string())
    }
}
