//! Registration and login flows on top of the store and the session
//! manager, plus the admin operations on accounts.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;

use agora_shared::types::auth::{OAuthIntent, UserRole};

use crate::models::{NewUser, Session, User};
use crate::store::{IdentityStore, UniqueField};

use super::authenticator::email_is_banned;
use super::oauth::FederatedIdentity;
use super::password::{hash_password, validate_password, verify_password};
use super::session::SessionManager;
use super::{AuthError, AuthResult};

const USERNAME_TAG_LEN: usize = 5;

/// A user together with the session just opened for them.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub session: Session,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `"Ada Lovelace"` becomes something like `"adalovelace_x7Qk2"`.
pub fn federated_username(display_name: &str) -> String {
    let mut base: String = display_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    if base.is_empty() {
        base.push_str("user");
    }
    let tag: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(USERNAME_TAG_LEN)
        .map(char::from)
        .collect();
    format!("{base}_{tag}")
}

#[derive(Clone)]
pub struct Accounts {
    store: Arc<dyn IdentityStore>,
    sessions: SessionManager,
}

impl Accounts {
    pub fn new(store: Arc<dyn IdentityStore>, sessions: SessionManager) -> Self {
        Self { store, sessions }
    }

    fn open_session(&self, user: User) -> AuthResult<LoginOutcome> {
        let session = self.sessions.create_session(user.id)?;
        Ok(LoginOutcome { user, session })
    }

    pub fn register_local(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> AuthResult<LoginOutcome> {
        let email = normalize_email(email);
        if !validator::validate_email(email.as_str()) {
            return Err(AuthError::Validation("invalid email address".into()));
        }
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::Validation("username is required".into()));
        }
        validate_password(password)?;

        if self.store.user_by_email(&email)?.is_some() {
            return Err(AuthError::AlreadyExists(UniqueField::Email));
        }
        if self.store.username_exists(username)? {
            return Err(AuthError::AlreadyExists(UniqueField::Username));
        }

        // The store's unique constraints still catch a concurrent duplicate.
        let user = self.store.insert_user(&NewUser {
            email,
            username: Some(username.to_string()),
            password_hash: Some(hash_password(password)?),
            role: UserRole::User,
        })?;

        tracing::info!(user_id = user.id, "user registered");
        self.open_session(user)
    }

    pub fn login_local(&self, email: &str, password: &str) -> AuthResult<LoginOutcome> {
        let email = normalize_email(email);
        if email_is_banned(self.store.as_ref(), &email)? {
            tracing::info!("login refused for banned identity");
            return Err(AuthError::Banned);
        }

        let user = self
            .store
            .user_by_email(&email)?
            .ok_or(AuthError::InvalidCredentials)?;
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(password, hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = user.id, "user logged in");
        self.open_session(user)
    }

    pub fn complete_federated(
        &self,
        identity: &FederatedIdentity,
        intent: OAuthIntent,
    ) -> AuthResult<LoginOutcome> {
        let email = normalize_email(&identity.email);
        let existing = self.store.user_by_email(&email)?;

        let user = match (intent, existing) {
            (OAuthIntent::Register, Some(_)) => {
                return Err(AuthError::AlreadyExists(UniqueField::Email))
            }
            (OAuthIntent::Register, None) => {
                let user = self.store.insert_user(&NewUser {
                    email,
                    username: Some(federated_username(&identity.display_name)),
                    password_hash: None,
                    role: UserRole::User,
                })?;
                tracing::info!(user_id = user.id, provider = %identity.provider, "federated user registered");
                user
            }
            (OAuthIntent::Login, Some(user)) => {
                tracing::info!(user_id = user.id, provider = %identity.provider, "federated login");
                user
            }
            (OAuthIntent::Login, None) => return Err(AuthError::IdentityNotFound),
        };

        self.open_session(user)
    }

    /// Creates the configured admin account unless an admin already exists.
    /// Returns the new admin, if one was created.
    pub fn ensure_admin(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> AuthResult<Option<User>> {
        if self.store.admin_exists()? {
            return Ok(None);
        }
        validate_password(password)?;

        let email = normalize_email(email);
        if let Some(existing) = self.store.user_by_email(&email)? {
            let promoted = self
                .store
                .set_role(existing.id, UserRole::Admin)?
                .ok_or(AuthError::NotFound)?;
            tracing::info!(user_id = promoted.id, "existing user promoted to admin");
            return Ok(Some(promoted));
        }

        let admin = self.store.insert_user(&NewUser {
            email,
            username: Some(username.to_string()),
            password_hash: Some(hash_password(password)?),
            role: UserRole::Admin,
        })?;
        tracing::info!(user_id = admin.id, "admin account created");
        Ok(Some(admin))
    }

    pub fn user(&self, user_id: i64) -> AuthResult<User> {
        self.store.user_by_id(user_id)?.ok_or(AuthError::NotFound)
    }

    pub fn users(&self) -> AuthResult<Vec<User>> {
        Ok(self.store.list_users()?)
    }

    pub fn delete_and_ban(&self, user_id: i64) -> AuthResult<User> {
        let user = self
            .store
            .delete_user_and_ban(user_id)?
            .ok_or(AuthError::NotFound)?;
        tracing::info!(user_id, "user deleted and banned");
        Ok(user)
    }

    pub fn set_role(&self, user_id: i64, role: UserRole) -> AuthResult<User> {
        let user = self.store.set_role(user_id, role)?.ok_or(AuthError::NotFound)?;
        tracing::info!(user_id, %role, "role changed");
        Ok(user)
    }

    pub fn ban_email(&self, email: &str) -> AuthResult<String> {
        let email = normalize_email(email);
        if !validator::validate_email(email.as_str()) {
            return Err(AuthError::Validation("invalid email address".into()));
        }
        self.store.ban_email(&email)?;
        tracing::info!("identity banned");
        Ok(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use agora_shared::types::auth::OAuthProvider;
    use std::time::Duration;

    fn setup() -> (Arc<MemoryStore>, Accounts) {
        let store = Arc::new(MemoryStore::new());
        let sessions = SessionManager::new(store.clone(), Duration::from_secs(600));
        (store.clone(), Accounts::new(store, sessions))
    }

    fn identity(email: &str) -> FederatedIdentity {
        FederatedIdentity {
            provider: OAuthProvider::Google,
            email: email.into(),
            display_name: "Ada Lovelace".into(),
        }
    }

    #[test]
    fn local_registration_stores_hash_and_opens_session() {
        let (store, accounts) = setup();
        let out = accounts.register_local("A@X.com", "alice", "secret1").unwrap();

        let user = store.user_by_email("a@x.com").unwrap().unwrap();
        let hash = user.password_hash.as_deref().unwrap();
        assert_ne!(hash, "secret1");
        assert!(verify_password("secret1", hash).unwrap());
        assert_eq!(store.sessions_for_user(user.id).unwrap(), vec![out.session]);
    }

    #[test]
    fn duplicate_registration_is_rejected_by_field() {
        let (_, accounts) = setup();
        accounts.register_local("a@x.com", "alice", "secret1").unwrap();

        assert!(matches!(
            accounts.register_local("a@x.com", "bob", "secret1"),
            Err(AuthError::AlreadyExists(UniqueField::Email))
        ));
        assert!(matches!(
            accounts.register_local("b@x.com", "alice", "secret1"),
            Err(AuthError::AlreadyExists(UniqueField::Username))
        ));
    }

    #[test]
    fn registration_input_checks() {
        let (_, accounts) = setup();
        assert!(matches!(accounts.register_local("nope", "a", "secret1"), Err(AuthError::Validation(_))));
        assert!(matches!(accounts.register_local("a@x.com", " ", "secret1"), Err(AuthError::Validation(_))));
        assert!(matches!(accounts.register_local("a@x.com", "a", "short"), Err(AuthError::WeakPassword(_))));
    }

    #[test]
    fn login_checks_ban_before_password() {
        let (store, accounts) = setup();
        accounts.register_local("a@x.com", "alice", "secret1").unwrap();
        assert!(accounts.login_local("a@x.com", "secret1").is_ok());
        assert!(matches!(accounts.login_local("a@x.com", "wrong!"), Err(AuthError::InvalidCredentials)));
        assert!(matches!(accounts.login_local("ghost@x.com", "secret1"), Err(AuthError::InvalidCredentials)));

        store.ban_email("a@x.com").unwrap();
        assert!(matches!(accounts.login_local("a@x.com", "secret1"), Err(AuthError::Banned)));
        assert!(matches!(accounts.login_local(" A@X.com ", "secret1"), Err(AuthError::Banned)));
    }

    #[test]
    fn federated_account_has_no_local_password() {
        let (_, accounts) = setup();
        accounts.complete_federated(&identity("ada@gmail.com"), OAuthIntent::Register).unwrap();
        assert!(matches!(
            accounts.login_local("ada@gmail.com", "anything"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn federated_register_then_login() {
        let (store, accounts) = setup();
        let reg = accounts.complete_federated(&identity("Ada@Gmail.com"), OAuthIntent::Register).unwrap();
        assert!(reg.user.is_federated());
        let name = reg.user.username.clone().unwrap();
        assert!(name.starts_with("adalovelace_"));

        let login = accounts.complete_federated(&identity("ada@gmail.com"), OAuthIntent::Login).unwrap();
        assert_eq!(login.user.id, reg.user.id);
        // the login superseded the registration session
        assert_eq!(store.sessions_for_user(reg.user.id).unwrap(), vec![login.session]);
    }

    #[test]
    fn federated_edge_cases() {
        let (_, accounts) = setup();
        assert!(matches!(
            accounts.complete_federated(&identity("new@gmail.com"), OAuthIntent::Login),
            Err(AuthError::IdentityNotFound)
        ));

        accounts.register_local("a@x.com", "alice", "secret1").unwrap();
        assert!(matches!(
            accounts.complete_federated(&identity("a@x.com"), OAuthIntent::Register),
            Err(AuthError::AlreadyExists(UniqueField::Email))
        ));
    }

    #[test]
    fn generated_usernames() {
        let name = federated_username("  Grace  Hopper ");
        let (base, tag) = name.split_once('_').unwrap();
        assert_eq!(base, "gracehopper");
        assert_eq!(tag.len(), USERNAME_TAG_LEN);
        assert!(tag.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(federated_username("").starts_with("user_"));
    }

    #[test]
    fn admin_seeding_runs_once() {
        let (store, accounts) = setup();
        let admin = accounts.ensure_admin("root@x.com", "root", "rootpass").unwrap().unwrap();
        assert!(admin.is_admin());
        assert!(accounts.ensure_admin("other@x.com", "other", "rootpass").unwrap().is_none());
        assert!(store.user_by_email("other@x.com").unwrap().is_none());
    }

    #[test]
    fn delete_and_ban_blocks_next_login() {
        let (store, accounts) = setup();
        let out = accounts.register_local("a@x.com", "alice", "secret1").unwrap();

        accounts.delete_and_ban(out.user.id).unwrap();
        assert!(store.sessions_for_user(out.user.id).unwrap().is_empty());
        assert!(matches!(accounts.login_local("a@x.com", "secret1"), Err(AuthError::Banned)));
        assert!(matches!(accounts.delete_and_ban(out.user.id), Err(AuthError::NotFound)));
    }

    #[test]
    fn role_changes() {
        let (_, accounts) = setup();
        let out = accounts.register_local("a@x.com", "alice", "secret1").unwrap();
        assert!(accounts.set_role(out.user.id, UserRole::Admin).unwrap().is_admin());
        assert!(matches!(accounts.set_role(999, UserRole::Admin), Err(AuthError::NotFound)));
    }
}
