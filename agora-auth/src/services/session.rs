//! Session Manager.
//!
//! Owns the single-session-per-user invariant: creating a session evicts
//! every other session of the same user, and each validated access evicts
//! any stragglers again while sliding the expiry forward.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::task::JoinHandle;

use crate::models::{Session, SessionLookup};
use crate::store::IdentityStore;

use super::{AuthError, AuthResult};

const TOKEN_BYTES: usize = 32;

/// 32 bytes from the OS CSPRNG, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn IdentityStore>,
    ttl: chrono::Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn IdentityStore>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::minutes(10));
        Self { store, ttl }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    pub fn create_session(&self, user_id: i64) -> AuthResult<Session> {
        let session = Session {
            token: generate_token(),
            user_id,
            expiry: Utc::now() + self.ttl,
        };
        if !self.store.replace_user_sessions(&session)? {
            return Err(AuthError::NotFound);
        }

        metrics::counter!("sessions_created_total").increment(1);
        tracing::debug!(user_id, "session created");
        Ok(session)
    }

    /// `Ok(None)` for an unknown token, `Err(Expired)` for a stale one.
    pub fn validate(&self, token: &str) -> AuthResult<Option<Session>> {
        let now = Utc::now();
        match self.store.refresh_session(token, now, now + self.ttl)? {
            SessionLookup::Missing => Ok(None),
            SessionLookup::Expired(session) => {
                metrics::counter!("sessions_expired_total").increment(1);
                tracing::debug!(user_id = session.user_id, "session expired");
                Err(AuthError::Expired)
            }
            SessionLookup::Live(session) => Ok(Some(session)),
        }
    }

    pub fn invalidate(&self, token: &str) -> AuthResult<()> {
        self.store.delete_session(token)?;
        Ok(())
    }

    /// Drops expired sessions and abandoned OAuth attempts.
    pub fn purge_expired(&self) -> AuthResult<usize> {
        let now = Utc::now();
        let sessions = self.store.delete_expired_sessions(now)?;
        let attempts = self.store.delete_expired_oauth_attempts(now)?;
        if sessions + attempts > 0 {
            tracing::info!(sessions, attempts, "purged expired rows");
        }
        Ok(sessions)
    }

    pub fn spawn_purge_task(self, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let manager = self.clone();
                match tokio::task::spawn_blocking(move || manager.purge_expired()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::warn!(error = %e, "session purge failed"),
                    Err(e) => tracing::error!(error = %e, "session purge task panicked"),
                }
            }
        })
    }
}
