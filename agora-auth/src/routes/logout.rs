use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use agora_shared::errors::AppResult;
use agora_shared::types::ApiResponse;

use crate::cookies::{clear_session_cookie, header_value, read_cookie, SESSION_COOKIE};
use crate::AppState;

/// Always expires the cookie, whether or not the session was still live.
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = read_cookie(&headers, SESSION_COOKIE) {
        state.blocking(move |s| s.sessions.invalidate(&token)).await?;
        tracing::info!("session invalidated");
    }

    let cookie = header_value(&clear_session_cookie(state.config.cookie_secure))?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::ok_with_message((), "logged out")),
    )
        .into_response())
}
