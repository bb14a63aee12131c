//! OAuth Bridge: authorization URLs, state nonces and the code exchange for
//! Google, GitHub and Facebook.
//!
//! Every redirect gets its own nonce, persisted as an `oauth_attempts` row
//! and echoed to the browser in the `oauth_state` cookie. A callback must
//! present the same nonce in the query and the cookie, and the row is
//! consumed on first use.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Url;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use agora_shared::types::auth::{OAuthIntent, OAuthProvider};

use crate::config::AppConfig;
use crate::models::OAuthAttempt;
use crate::store::IdentityStore;

use super::{AuthError, AuthResult};

const STATE_BYTES: usize = 32;
const CLIENT_USER_AGENT: &str = concat!("agora-auth/", env!("CARGO_PKG_VERSION"));

/// Fixed endpoints of one identity provider.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize: String,
    pub token: String,
    pub userinfo: String,
    /// Secondary e-mail listing, GitHub only.
    pub emails: Option<String>,
    pub scopes: &'static [&'static str],
    pub extra_params: &'static [(&'static str, &'static str)],
}

impl ProviderEndpoints {
    pub fn defaults(provider: OAuthProvider) -> Self {
        match provider {
            OAuthProvider::Google => Self {
                authorize: "https://accounts.google.com/o/oauth2/auth".into(),
                token: "https://oauth2.googleapis.com/token".into(),
                userinfo: "https://www.googleapis.com/oauth2/v2/userinfo".into(),
                emails: None,
                scopes: &[
                    "https://www.googleapis.com/auth/userinfo.email",
                    "https://www.googleapis.com/auth/userinfo.profile",
                ],
                extra_params: &[("access_type", "offline"), ("prompt", "consent")],
            },
            OAuthProvider::GitHub => Self {
                authorize: "https://github.com/login/oauth/authorize".into(),
                token: "https://github.com/login/oauth/access_token".into(),
                userinfo: "https://api.github.com/user".into(),
                emails: Some("https://api.github.com/user/emails".into()),
                scopes: &["user:email"],
                extra_params: &[],
            },
            OAuthProvider::Facebook => Self {
                authorize: "https://www.facebook.com/v3.2/dialog/oauth".into(),
                token: "https://graph.facebook.com/v3.2/oauth/access_token".into(),
                userinfo: "https://graph.facebook.com/me?fields=id,name,email".into(),
                emails: None,
                scopes: &["email"],
                extra_params: &[],
            },
        }
    }

    /// Same shape as `defaults`, with every URL served from `base`.
    #[cfg(test)]
    pub(crate) fn rooted_at(provider: OAuthProvider, base: &str) -> Self {
        let p = provider.as_str();
        Self {
            authorize: format!("{base}/{p}/authorize"),
            token: format!("{base}/{p}/token"),
            userinfo: format!("{base}/{p}/user"),
            emails: (provider == OAuthProvider::GitHub).then(|| format!("{base}/{p}/user/emails")),
            ..Self::defaults(provider)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Who the provider says the user is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub provider: OAuthProvider,
    pub email: String,
    pub display_name: String,
}

/// Where to send the browser, and the nonce to pin in its cookie.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub url: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    email: Option<String>,
    name: Option<String>,
    /// GitHub handle
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailEntry {
    email: String,
    primary: bool,
    verified: bool,
}

fn upstream(provider: OAuthProvider, what: &str, err: impl std::fmt::Display) -> AuthError {
    AuthError::Upstream(format!("{provider} {what}: {err}"))
}

fn state_check_aborted(err: tokio::task::JoinError) -> AuthError {
    AuthError::Internal(format!("state check aborted: {err}"))
}

#[derive(Clone)]
pub struct OAuthBridge {
    http: reqwest::Client,
    store: Arc<dyn IdentityStore>,
    endpoints: HashMap<OAuthProvider, ProviderEndpoints>,
    credentials: HashMap<OAuthProvider, ClientCredentials>,
    public_base_url: String,
    state_ttl: chrono::Duration,
}

impl OAuthBridge {
    pub fn new(config: &AppConfig, store: Arc<dyn IdentityStore>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        let state_ttl = chrono::Duration::from_std(Duration::from_secs(config.oauth_state_ttl_secs))
            .map_err(|_| {
                anyhow::anyhow!("oauth_state_ttl_secs out of range: {}", config.oauth_state_ttl_secs)
            })?;

        let endpoints = OAuthProvider::ALL
            .iter()
            .map(|p| (*p, ProviderEndpoints::defaults(*p)))
            .collect();
        let credentials = HashMap::from([
            (
                OAuthProvider::Google,
                ClientCredentials {
                    client_id: config.google_client_id.clone(),
                    client_secret: config.google_client_secret.clone(),
                },
            ),
            (
                OAuthProvider::GitHub,
                ClientCredentials {
                    client_id: config.github_client_id.clone(),
                    client_secret: config.github_client_secret.clone(),
                },
            ),
            (
                OAuthProvider::Facebook,
                ClientCredentials {
                    client_id: config.facebook_client_id.clone(),
                    client_secret: config.facebook_client_secret.clone(),
                },
            ),
        ]);

        Ok(Self {
            http,
            store,
            endpoints,
            credentials,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            state_ttl,
        })
    }

    pub fn with_endpoints(mut self, provider: OAuthProvider, endpoints: ProviderEndpoints) -> Self {
        self.endpoints.insert(provider, endpoints);
        self
    }

    pub fn state_ttl(&self) -> chrono::Duration {
        self.state_ttl
    }

    pub fn redirect_uri(&self, provider: OAuthProvider) -> String {
        format!("{}/{provider}/callback", self.public_base_url)
    }

    fn endpoints(&self, provider: OAuthProvider) -> AuthResult<&ProviderEndpoints> {
        self.endpoints
            .get(&provider)
            .ok_or_else(|| AuthError::Upstream(format!("{provider} is not configured")))
    }

    fn credentials(&self, provider: OAuthProvider) -> ClientCredentials {
        self.credentials.get(&provider).cloned().unwrap_or_default()
    }

    /// Persists a fresh attempt and returns the provider URL to redirect to.
    pub fn build_authorization_url(
        &self,
        provider: OAuthProvider,
        intent: OAuthIntent,
    ) -> AuthResult<PendingAuthorization> {
        let endpoints = self.endpoints(provider)?;

        let mut nonce = [0u8; STATE_BYTES];
        OsRng.fill_bytes(&mut nonce);
        let state = hex::encode(nonce);

        let creds = self.credentials(provider);
        let scope = endpoints.scopes.join(" ");
        let redirect_uri = self.redirect_uri(provider);
        let mut params: Vec<(&str, &str)> = vec![
            ("client_id", creds.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", state.as_str()),
        ];
        params.extend_from_slice(endpoints.extra_params);
        let url = Url::parse_with_params(&endpoints.authorize, &params)
            .map_err(|e| upstream(provider, "authorize url", e))?;

        self.store.insert_oauth_attempt(&OAuthAttempt {
            state: state.clone(),
            provider,
            intent,
            expires_at: Utc::now() + self.state_ttl,
        })?;

        tracing::debug!(%provider, %intent, "oauth attempt started");
        Ok(PendingAuthorization { url: url.into(), state })
    }

    /// Checks the callback's state against the browser cookie and consumes
    /// the matching attempt. The attempt is gone afterwards whatever the
    /// outcome, so a state value is good for one callback only.
    pub fn consume_attempt(
        &self,
        provider: OAuthProvider,
        presented_state: Option<&str>,
        browser_state: Option<&str>,
    ) -> AuthResult<OAuthAttempt> {
        let presented = presented_state.filter(|s| !s.is_empty()).ok_or(AuthError::StateMismatch)?;

        let attempt = self.store.take_oauth_attempt(presented)?;

        let cookie_matches = browser_state
            .map(|b| bool::from(b.as_bytes().ct_eq(presented.as_bytes())))
            .unwrap_or(false);
        if !cookie_matches {
            return Err(AuthError::StateMismatch);
        }

        match attempt {
            Some(a) if a.provider == provider && a.expires_at > Utc::now() => Ok(a),
            _ => Err(AuthError::StateMismatch),
        }
    }

    /// Trades `code` for an access token and reads the user's profile.
    pub async fn fetch_identity(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> AuthResult<FederatedIdentity> {
        let endpoints = self.endpoints(provider)?;
        let creds = self.credentials(provider);
        let redirect_uri = self.redirect_uri(provider);

        let resp = self
            .http
            .post(&endpoints.token)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| upstream(provider, "token exchange", e))?;
        if !resp.status().is_success() {
            return Err(upstream(provider, "token exchange", resp.status()));
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| upstream(provider, "token response", e))?;
        let access_token = match token.access_token {
            Some(t) if !t.is_empty() => t,
            _ => {
                let reason = token
                    .error_description
                    .or(token.error)
                    .unwrap_or_else(|| "no access token".into());
                return Err(upstream(provider, "token exchange", reason));
            }
        };

        let profile: ProfileResponse = self.get_json(provider, &endpoints.userinfo, &access_token).await?;

        let mut email = profile.email.filter(|e| !e.trim().is_empty());
        if email.is_none() {
            if let Some(url) = &endpoints.emails {
                let entries: Vec<EmailEntry> = self.get_json(provider, url, &access_token).await?;
                email = entries.into_iter().find(|e| e.primary && e.verified).map(|e| e.email);
            }
        }
        let email = email.ok_or_else(|| upstream(provider, "profile", "no verified e-mail"))?;

        let display_name = profile
            .name
            .filter(|n| !n.trim().is_empty())
            .or(profile.login)
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        Ok(FederatedIdentity { provider, email, display_name })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        provider: OAuthProvider,
        url: &str,
        access_token: &str,
    ) -> AuthResult<T> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await
            .map_err(|e| upstream(provider, "profile request", e))?;
        if !resp.status().is_success() {
            return Err(upstream(provider, "profile request", resp.status()));
        }
        resp.json().await.map_err(|e| upstream(provider, "profile response", e))
    }

    /// Full callback: state check, then the provider round trips. Returns
    /// the identity and the intent recorded when the attempt started.
    pub async fn complete_exchange(
        &self,
        provider: OAuthProvider,
        code: Option<&str>,
        presented_state: Option<&str>,
        browser_state: Option<&str>,
    ) -> AuthResult<(FederatedIdentity, OAuthIntent)> {
        let bridge = self.clone();
        let presented = presented_state.map(str::to_owned);
        let browser = browser_state.map(str::to_owned);
        let attempt = tokio::task::spawn_blocking(move || {
            bridge.consume_attempt(provider, presented.as_deref(), browser.as_deref())
        })
        .await
        .map_err(state_check_aborted)?;

        let outcome = match attempt {
            Ok(attempt) => match code.filter(|c| !c.is_empty()) {
                Some(code) => self.fetch_identity(provider, code).await.map(|id| (id, attempt.intent)),
                None => Err(upstream(provider, "callback", "missing code")),
            },
            Err(e) => Err(e),
        };

        let label = match &outcome {
            Ok(_) => "ok",
            Err(AuthError::StateMismatch) => "state_mismatch",
            Err(_) => "error",
        };
        metrics::counter!("oauth_exchanges_total", "provider" => provider.as_str(), "outcome" => label)
            .increment(1);
        outcome
    }
}
