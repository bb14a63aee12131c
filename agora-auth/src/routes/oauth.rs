use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use serde::Deserialize;
use std::sync::Arc;

use agora_shared::errors::{AppError, AppResult};
use agora_shared::types::auth::{OAuthIntent, OAuthProvider};

use crate::cookies::{
    clear_oauth_state_cookie, header_value, oauth_state_cookie, read_cookie, session_cookie,
    OAUTH_STATE_COOKIE,
};
use crate::services::AuthError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user declines consent.
    pub error: Option<String>,
}

fn parse_provider(raw: &str) -> AppResult<OAuthProvider> {
    raw.parse()
        .map_err(|_| AppError::not_found(format!("unknown provider: {raw}")))
}

async fn begin(state: Arc<AppState>, raw: String, intent: OAuthIntent) -> AppResult<Response> {
    let provider = parse_provider(&raw)?;
    let pending = state
        .blocking(move |s| s.oauth.build_authorization_url(provider, intent))
        .await?;

    let cookie = oauth_state_cookie(&pending.state, state.oauth.state_ttl(), state.config.cookie_secure);
    Ok((
        AppendHeaders([(header::SET_COOKIE, header_value(&cookie)?)]),
        Redirect::temporary(&pending.url),
    )
        .into_response())
}

pub async fn begin_login(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> AppResult<Response> {
    begin(state, provider, OAuthIntent::Login).await
}

pub async fn begin_register(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> AppResult<Response> {
    begin(state, provider, OAuthIntent::Register).await
}

/// Provider redirect target. A state mismatch sends the browser home
/// anonymously; any other failure is reported as an error. Either way the
/// state cookie is cleared, since its attempt has been consumed.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let provider = parse_provider(&provider)?;
    let secure = state.config.cookie_secure;
    let clear_state = header_value(&clear_oauth_state_cookie(secure))?;

    if let Some(error) = &params.error {
        tracing::info!(%provider, error = %error, "provider returned an error");
    }

    let browser_state = read_cookie(&headers, OAUTH_STATE_COOKIE);
    let exchange = state
        .oauth
        .complete_exchange(
            provider,
            params.code.as_deref(),
            params.state.as_deref(),
            browser_state.as_deref(),
        )
        .await;

    let (identity, intent) = match exchange {
        Ok(ok) => ok,
        Err(AuthError::StateMismatch) => {
            tracing::warn!(%provider, "oauth state mismatch");
            return Ok((
                AppendHeaders([(header::SET_COOKIE, clear_state)]),
                Redirect::temporary("/"),
            )
                .into_response());
        }
        Err(e) => {
            return Ok((AppendHeaders([(header::SET_COOKIE, clear_state)]), AppError::from(e))
                .into_response())
        }
    };

    let outcome = match state
        .blocking(move |s| s.accounts.complete_federated(&identity, intent))
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return Ok((AppendHeaders([(header::SET_COOKIE, clear_state)]), e).into_response()),
    };

    let session = header_value(&session_cookie(&outcome.session.token, outcome.session.expiry, secure))?;
    let target = match intent {
        OAuthIntent::Register => "/me",
        OAuthIntent::Login => "/",
    };
    Ok((
        AppendHeaders([(header::SET_COOKIE, clear_state), (header::SET_COOKIE, session)]),
        Redirect::to(target),
    )
        .into_response())
}
