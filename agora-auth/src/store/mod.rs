//! Credential store: users, sessions, banned identities and pending OAuth
//! attempts.
//!
//! Every method is one atomic unit against the backing store. Multi-row
//! operations (session replacement, refresh with sibling eviction,
//! delete-and-ban) run inside a single transaction, and operations on the
//! same user are serialised by locking that user's row first.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use chrono::{DateTime, Utc};

use agora_shared::types::auth::UserRole;

use crate::models::{NewUser, OAuthAttempt, Session, SessionLookup, User};

/// Column whose uniqueness constraint rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UniqueField::Email => f.write_str("email"),
            UniqueField::Username => f.write_str("username"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("{0} already exists")]
    Conflict(UniqueField),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait IdentityStore: Send + Sync {
    // --- users ---

    /// Fails with `StoreError::Conflict` when the e-mail or username is taken.
    fn insert_user(&self, user: &NewUser) -> StoreResult<User>;
    fn user_by_id(&self, id: i64) -> StoreResult<Option<User>>;
    fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    fn username_exists(&self, username: &str) -> StoreResult<bool>;
    fn admin_exists(&self) -> StoreResult<bool>;
    fn set_role(&self, id: i64, role: UserRole) -> StoreResult<Option<User>>;
    /// Every account, oldest first.
    fn list_users(&self) -> StoreResult<Vec<User>>;
    /// Deletes the user (and with it every session they own) and bans their
    /// e-mail, all or nothing. Returns the removed user.
    fn delete_user_and_ban(&self, id: i64) -> StoreResult<Option<User>>;

    // --- bans ---

    fn ban_email(&self, email: &str) -> StoreResult<()>;
    fn is_banned(&self, email: &str) -> StoreResult<bool>;

    // --- sessions ---

    /// Removes every session of `session.user_id` and inserts `session`.
    /// Returns `false` (and writes nothing) if the user does not exist.
    fn replace_user_sessions(&self, session: &Session) -> StoreResult<bool>;
    /// Looks up `token`; when live at `now`, deletes its siblings and moves
    /// its expiry to `new_expiry`.
    fn refresh_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
        new_expiry: DateTime<Utc>,
    ) -> StoreResult<SessionLookup>;
    fn delete_session(&self, token: &str) -> StoreResult<()>;
    fn sessions_for_user(&self, user_id: i64) -> StoreResult<Vec<Session>>;
    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<usize>;

    // --- oauth attempts ---

    fn insert_oauth_attempt(&self, attempt: &OAuthAttempt) -> StoreResult<()>;
    /// Removes and returns the attempt keyed by `state`. At most one caller
    /// ever receives a given attempt.
    fn take_oauth_attempt(&self, state: &str) -> StoreResult<Option<OAuthAttempt>>;
    fn delete_expired_oauth_attempts(&self, now: DateTime<Utc>) -> StoreResult<usize>;

    fn ping(&self) -> StoreResult<()>;
}
