use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use agora_shared::errors::{AppError, AppResult, ErrorCode};

use crate::routes::register::session_response;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let outcome = state
        .blocking(move |s| s.accounts.login_local(&req.email, &req.password))
        .await?;

    session_response(&state, outcome)
}
