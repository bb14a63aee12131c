use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use agora_shared::errors::{AppError, AppResult, ErrorCode};
use agora_shared::types::ApiResponse;

use crate::cookies::{header_value, session_cookie};
use crate::models::User;
use crate::services::accounts::LoginOutcome;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, max = 64, message = "username must be 1 to 64 characters"))]
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub session_expires_at: chrono::DateTime<chrono::Utc>,
}

/// JSON body plus the `Set-Cookie` carrying the new session token.
pub(crate) fn session_response(state: &AppState, outcome: LoginOutcome) -> AppResult<Response> {
    let cookie = session_cookie(&outcome.session.token, outcome.session.expiry, state.config.cookie_secure);
    let body = ApiResponse::ok(SessionResponse {
        user: outcome.user,
        session_expires_at: outcome.session.expiry,
    });
    Ok(([(header::SET_COOKIE, header_value(&cookie)?)], Json(body)).into_response())
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Response> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let outcome = state
        .blocking(move |s| s.accounts.register_local(&req.email, &req.username, &req.password))
        .await?;

    session_response(&state, outcome)
}
