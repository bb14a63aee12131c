use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use agora_shared::types::auth::UserRole;

use crate::models::{NewUser, OAuthAttempt, Session, SessionLookup, User};

use super::{IdentityStore, StoreResult, StoreError, UniqueField};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    next_id: i64,
    sessions: HashMap<String, Session>,
    banned: HashSet<String>,
    attempts: HashMap<String, OAuthAttempt>,
}

impl Tables {
    fn drop_sessions_of(&mut self, user_id: i64) {
        self.sessions.retain(|_, s| s.user_id != user_id);
    }
}

/// In-process store for development and tests. One mutex guards every
/// table, so each trait call is atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a session without evicting siblings, to set up states the
    /// public API never produces.
    #[cfg(test)]
    pub(crate) fn force_insert_session(&self, session: Session) {
        self.tables.lock().sessions.insert(session.token.clone(), session);
    }
}

impl IdentityStore for MemoryStore {
    fn insert_user(&self, user: &NewUser) -> StoreResult<User> {
        let mut t = self.tables.lock();
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(UniqueField::Email));
        }
        if let Some(name) = &user.username {
            if t.users.values().any(|u| u.username.as_ref() == Some(name)) {
                return Err(StoreError::Conflict(UniqueField::Username));
            }
        }

        t.next_id += 1;
        let created = User {
            id: t.next_id,
            email: user.email.clone(),
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            created_at: Utc::now(),
        };
        t.users.insert(created.id, created.clone());
        Ok(created)
    }

    fn user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().users.values().find(|u| u.email == email).cloned())
    }

    fn username_exists(&self, username: &str) -> StoreResult<bool> {
        Ok(self
            .tables
            .lock()
            .users
            .values()
            .any(|u| u.username.as_deref() == Some(username)))
    }

    fn admin_exists(&self) -> StoreResult<bool> {
        Ok(self.tables.lock().users.values().any(User::is_admin))
    }

    fn set_role(&self, id: i64, role: UserRole) -> StoreResult<Option<User>> {
        let mut t = self.tables.lock();
        Ok(t.users.get_mut(&id).map(|u| {
            u.role = role;
            u.clone()
        }))
    }

    fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.tables.lock().users.values().cloned().collect())
    }

    fn delete_user_and_ban(&self, id: i64) -> StoreResult<Option<User>> {
        let mut t = self.tables.lock();
        let Some(user) = t.users.remove(&id) else {
            return Ok(None);
        };
        t.drop_sessions_of(id);
        t.banned.insert(user.email.clone());
        Ok(Some(user))
    }

    fn ban_email(&self, email: &str) -> StoreResult<()> {
        self.tables.lock().banned.insert(email.to_string());
        Ok(())
    }

    fn is_banned(&self, email: &str) -> StoreResult<bool> {
        Ok(self.tables.lock().banned.contains(email))
    }

    fn replace_user_sessions(&self, session: &Session) -> StoreResult<bool> {
        let mut t = self.tables.lock();
        if !t.users.contains_key(&session.user_id) {
            return Ok(false);
        }
        t.drop_sessions_of(session.user_id);
        t.sessions.insert(session.token.clone(), session.clone());
        Ok(true)
    }

    fn refresh_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
        new_expiry: DateTime<Utc>,
    ) -> StoreResult<SessionLookup> {
        let mut t = self.tables.lock();
        let Some(current) = t.sessions.get(token).cloned() else {
            return Ok(SessionLookup::Missing);
        };
        if current.is_expired_at(now) {
            return Ok(SessionLookup::Expired(current));
        }

        t.sessions
            .retain(|k, s| s.user_id != current.user_id || k == token);
        let refreshed = Session { expiry: new_expiry, ..current };
        t.sessions.insert(token.to_string(), refreshed.clone());
        Ok(SessionLookup::Live(refreshed))
    }

    fn delete_session(&self, token: &str) -> StoreResult<()> {
        self.tables.lock().sessions.remove(token);
        Ok(())
    }

    fn sessions_for_user(&self, user_id: i64) -> StoreResult<Vec<Session>> {
        Ok(self
            .tables
            .lock()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut t = self.tables.lock();
        let before = t.sessions.len();
        t.sessions.retain(|_, s| !s.is_expired_at(now));
        Ok(before - t.sessions.len())
    }

    fn insert_oauth_attempt(&self, attempt: &OAuthAttempt) -> StoreResult<()> {
        self.tables
            .lock()
            .attempts
            .insert(attempt.state.clone(), attempt.clone());
        Ok(())
    }

    fn take_oauth_attempt(&self, state: &str) -> StoreResult<Option<OAuthAttempt>> {
        Ok(self.tables.lock().attempts.remove(state))
    }

    fn delete_expired_oauth_attempts(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut t = self.tables.lock();
        let before = t.attempts.len();
        t.attempts.retain(|_, a| a.expires_at > now);
        Ok(before - t.attempts.len())
    }

    fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_shared::types::auth::{OAuthIntent, OAuthProvider};
    use chrono::Duration;

    fn new_user(email: &str, username: Option<&str>) -> NewUser {
        NewUser {
            email: email.into(),
            username: username.map(Into::into),
            password_hash: Some("hash".into()),
            role: UserRole::User,
        }
    }

    fn session(token: &str, user_id: i64, expiry: DateTime<Utc>) -> Session {
        Session { token: token.into(), user_id, expiry }
    }

    #[test]
    fn duplicate_email_and_username_conflict() {
        let store = MemoryStore::new();
        store.insert_user(&new_user("a@x.com", Some("alice"))).unwrap();

        let err = store.insert_user(&new_user("a@x.com", Some("other"))).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(UniqueField::Email)));

        let err = store.insert_user(&new_user("b@x.com", Some("alice"))).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(UniqueField::Username)));

        // federated users have no username, several may coexist
        store.insert_user(&new_user("c@x.com", None)).unwrap();
        store.insert_user(&new_user("d@x.com", None)).unwrap();
    }

    #[test]
    fn users_are_listed_oldest_first() {
        let store = MemoryStore::new();
        assert!(store.list_users().unwrap().is_empty());
        store.insert_user(&new_user("a@x.com", Some("alice"))).unwrap();
        store.insert_user(&new_user("b@x.com", Some("bob"))).unwrap();

        let emails: Vec<_> = store.list_users().unwrap().into_iter().map(|u| u.email).collect();
        assert_eq!(emails, ["a@x.com", "b@x.com"]);
    }

    #[test]
    fn replace_keeps_exactly_one_session() {
        let store = MemoryStore::new();
        let user = store.insert_user(&new_user("a@x.com", Some("alice"))).unwrap();
        let exp = Utc::now() + Duration::minutes(10);

        assert!(store.replace_user_sessions(&session("s1", user.id, exp)).unwrap());
        assert!(store.replace_user_sessions(&session("s2", user.id, exp)).unwrap());

        let live = store.sessions_for_user(user.id).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].token, "s2");
    }

    #[test]
    fn replace_for_unknown_user_writes_nothing() {
        let store = MemoryStore::new();
        let exp = Utc::now() + Duration::minutes(10);
        assert!(!store.replace_user_sessions(&session("s1", 42, exp)).unwrap());
        assert!(store.sessions_for_user(42).unwrap().is_empty());
    }

    #[test]
    fn refresh_evicts_siblings_and_extends() {
        let store = MemoryStore::new();
        let user = store.insert_user(&new_user("a@x.com", Some("alice"))).unwrap();
        let now = Utc::now();
        store.force_insert_session(session("s1", user.id, now + Duration::minutes(1)));
        store.force_insert_session(session("s2", user.id, now + Duration::minutes(1)));

        let later = now + Duration::minutes(10);
        let SessionLookup::Live(s) = store.refresh_session("s1", now, later).unwrap() else {
            panic!("expected live session");
        };
        assert_eq!(s.expiry, later);
        let left = store.sessions_for_user(user.id).unwrap();
        assert_eq!(left, vec![session("s1", user.id, later)]);
    }

    #[test]
    fn refresh_reports_expired_without_deleting() {
        let store = MemoryStore::new();
        let user = store.insert_user(&new_user("a@x.com", Some("alice"))).unwrap();
        let now = Utc::now();
        store.force_insert_session(session("s1", user.id, now));

        let lookup = store.refresh_session("s1", now, now + Duration::minutes(10)).unwrap();
        assert!(matches!(lookup, SessionLookup::Expired(_)));
        assert_eq!(store.sessions_for_user(user.id).unwrap().len(), 1);

        assert_eq!(store.refresh_session("nope", now, now).unwrap(), SessionLookup::Missing);
    }

    #[test]
    fn delete_and_ban_cascades_sessions() {
        let store = MemoryStore::new();
        let user = store.insert_user(&new_user("a@x.com", Some("alice"))).unwrap();
        let exp = Utc::now() + Duration::minutes(10);
        store.replace_user_sessions(&session("s1", user.id, exp)).unwrap();

        let removed = store.delete_user_and_ban(user.id).unwrap().unwrap();
        assert_eq!(removed.email, "a@x.com");
        assert!(store.is_banned("a@x.com").unwrap());
        assert!(store.sessions_for_user(user.id).unwrap().is_empty());
        assert!(store.delete_user_and_ban(user.id).unwrap().is_none());
    }

    #[test]
    fn oauth_attempt_is_taken_once() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let attempt = OAuthAttempt {
            state: "nonce".into(),
            provider: OAuthProvider::GitHub,
            intent: OAuthIntent::Login,
            expires_at: now + Duration::minutes(10),
        };
        store.insert_oauth_attempt(&attempt).unwrap();

        assert_eq!(store.take_oauth_attempt("nonce").unwrap(), Some(attempt));
        assert_eq!(store.take_oauth_attempt("nonce").unwrap(), None);
    }

    #[test]
    fn purge_removes_only_expired_rows() {
        let store = MemoryStore::new();
        let user = store.insert_user(&new_user("a@x.com", Some("alice"))).unwrap();
        let other = store.insert_user(&new_user("b@x.com", Some("bob"))).unwrap();
        let now = Utc::now();
        store.force_insert_session(session("old", user.id, now - Duration::seconds(1)));
        store.force_insert_session(session("new", other.id, now + Duration::minutes(1)));

        assert_eq!(store.delete_expired_sessions(now).unwrap(), 1);
        assert!(store.sessions_for_user(user.id).unwrap().is_empty());
        assert_eq!(store.sessions_for_user(other.id).unwrap().len(), 1);
    }
}
