use std::sync::Arc;

use axum::http::HeaderMap;

use agora_shared::types::auth::AuthUser;

use crate::cookies::{read_cookie, SESSION_COOKIE};
use crate::models::Session;
use crate::store::IdentityStore;

use super::accounts::normalize_email;
use super::session::SessionManager;
use super::{AuthError, AuthResult};

/// Ban lookup on the normalised e-mail. Every ban check goes through here.
pub(crate) fn email_is_banned(store: &dyn IdentityStore, email: &str) -> AuthResult<bool> {
    Ok(store.is_banned(&normalize_email(email))?)
}

/// Turns a request's cookies into an identity. Anything short of a live
/// session is anonymous; only store failures surface as errors.
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn IdentityStore>,
    sessions: SessionManager,
}

impl Authenticator {
    pub fn new(store: Arc<dyn IdentityStore>, sessions: SessionManager) -> Self {
        Self { store, sessions }
    }

    pub fn authenticate_request(&self, headers: &HeaderMap) -> AuthResult<Option<Session>> {
        let Some(token) = read_cookie(headers, SESSION_COOKIE) else {
            return Ok(None);
        };
        match self.sessions.validate(&token) {
            Ok(session) => Ok(session),
            Err(AuthError::Expired) | Err(AuthError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn is_admin(&self, user_id: i64) -> AuthResult<bool> {
        Ok(self
            .store
            .user_by_id(user_id)?
            .map(|u| u.is_admin())
            .unwrap_or(false))
    }

    pub fn is_banned(&self, email: &str) -> AuthResult<bool> {
        email_is_banned(self.store.as_ref(), email)
    }

    /// Authenticates and loads the owning user. A session whose user has
    /// vanished counts as anonymous.
    pub fn resolve(&self, headers: &HeaderMap) -> AuthResult<Option<(Session, AuthUser)>> {
        let Some(session) = self.authenticate_request(headers)? else {
            return Ok(None);
        };
        let Some(user) = self.store.user_by_id(session.user_id)? else {
            tracing::warn!(user_id = session.user_id, "session without user");
            return Ok(None);
        };
        let auth_user = AuthUser {
            id: user.id,
            username: user.username,
            role: user.role,
            session_expires_at: session.expiry,
        };
        Ok(Some((session, auth_user)))
    }
}
