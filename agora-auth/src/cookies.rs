use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};

use agora_shared::errors::AppError;

pub const SESSION_COOKIE: &str = "session_token";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

pub fn read_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|part| part.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

fn secure_attr(secure: bool) -> &'static str {
    if secure {
        "; Secure"
    } else {
        ""
    }
}

/// Session cookie whose browser expiry matches the stored session expiry.
pub fn session_cookie(token: &str, expires: DateTime<Utc>, secure: bool) -> String {
    format!(
        "{name}={token}; Path=/; HttpOnly; SameSite=Lax; Expires={expires}{secure}",
        name = SESSION_COOKIE,
        expires = expires.format("%a, %d %b %Y %H:%M:%S GMT"),
        secure = secure_attr(secure),
    )
}

pub fn clear_session_cookie(secure: bool) -> String {
    format!(
        "{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{secure}",
        name = SESSION_COOKIE,
        secure = secure_attr(secure),
    )
}

/// Binds a pending OAuth attempt to the browser that started it. `Lax` so
/// it survives the top-level redirect back from the provider.
pub fn oauth_state_cookie(state: &str, max_age: chrono::Duration, secure: bool) -> String {
    format!(
        "{name}={state}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}{secure}",
        name = OAUTH_STATE_COOKIE,
        max_age = max_age.num_seconds().max(0),
        secure = secure_attr(secure),
    )
}

pub fn clear_oauth_state_cookie(secure: bool) -> String {
    format!(
        "{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{secure}",
        name = OAUTH_STATE_COOKIE,
        secure = secure_attr(secure),
    )
}

pub fn header_value(cookie: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(cookie).map_err(|e| AppError::internal(format!("invalid cookie header: {e}")))
}

/// Whether the response already sets a cookie named `name`.
pub fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split_once('=').map(|(n, _)| n.trim() == name).unwrap_or(false))
}
