use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use agora_shared::types::auth::{OAuthIntent, OAuthProvider, UserRole};

use crate::schema::{oauth_attempts, sessions, users};
use crate::store::StoreError;

// --- Users ---

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// A forum account. Local accounts carry a password hash; federated ones
/// (created through an OAuth provider) never do.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_federated(&self) -> bool {
        self.password_hash.is_none()
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<UserRole>()
            .map_err(|e| StoreError::Corrupt(format!("user {}: {e}", row.id)))?;
        Ok(Self {
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            role,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUserRow<'a> {
    pub email: &'a str,
    pub username: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub role: &'a str,
}

impl<'a> From<&'a NewUser> for NewUserRow<'a> {
    fn from(user: &'a NewUser) -> Self {
        Self {
            email: &user.email,
            username: user.username.as_deref(),
            password_hash: user.password_hash.as_deref(),
            role: user.role.as_str(),
        }
    }
}

// --- Sessions ---

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Session {
    #[diesel(column_name = id)]
    #[serde(skip_serializing)]
    pub token: String,
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

/// What the store found when asked to refresh a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
    Missing,
    Expired(Session),
    Live(Session),
}

// --- OAuth attempts ---

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = oauth_attempts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OAuthAttemptRow {
    pub state: String,
    pub provider: String,
    pub intent: String,
    pub expires_at: DateTime<Utc>,
}

/// A redirect to an identity provider that has not come back yet. Keyed by
/// its own nonce, so concurrent sign-ins never share state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthAttempt {
    pub state: String,
    pub provider: OAuthProvider,
    pub intent: OAuthIntent,
    pub expires_at: DateTime<Utc>,
}

impl From<&OAuthAttempt> for OAuthAttemptRow {
    fn from(attempt: &OAuthAttempt) -> Self {
        Self {
            state: attempt.state.clone(),
            provider: attempt.provider.as_str().to_string(),
            intent: attempt.intent.as_str().to_string(),
            expires_at: attempt.expires_at,
        }
    }
}

impl TryFrom<OAuthAttemptRow> for OAuthAttempt {
    type Error = StoreError;

    fn try_from(row: OAuthAttemptRow) -> Result<Self, Self::Error> {
        let provider = row.provider.parse().map_err(StoreError::Corrupt)?;
        let intent = row.intent.parse().map_err(StoreError::Corrupt)?;
        Ok(Self {
            state: row.state,
            provider,
            intent,
            expires_at: row.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str) -> UserRow {
        UserRow {
            id: 1,
            email: "a@x.com".into(),
            username: Some("alice".into()),
            password_hash: None,
            role: role.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn unknown_role_is_rejected_not_demoted() {
        assert!(matches!(User::try_from(row("superuser")), Err(StoreError::Corrupt(_))));
        assert_eq!(User::try_from(row("admin")).unwrap().role, UserRole::Admin);
    }

    #[test]
    fn password_hash_never_serializes() {
        let mut user = User::try_from(row("user")).unwrap();
        user.password_hash = Some("$argon2id$...".into());
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn session_expiring_now_counts_as_expired() {
        let now = Utc::now();
        let session = Session { token: "t".into(), user_id: 1, expiry: now };
        assert!(session.is_expired_at(now));
        assert!(!session.is_expired_at(now - chrono::Duration::seconds(1)));
    }
}
