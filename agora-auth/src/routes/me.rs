use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use agora_shared::errors::AppResult;
use agora_shared::types::auth::AuthUser;
use agora_shared::types::ApiResponse;

use crate::models::User;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub federated: bool,
    pub session_expires_at: chrono::DateTime<chrono::Utc>,
}

pub async fn me(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<MeResponse>>> {
    let expires = user.session_expires_at;
    let account = state.blocking(move |s| s.accounts.user(user.id)).await?;

    Ok(Json(ApiResponse::ok(MeResponse {
        federated: account.is_federated(),
        user: account,
        session_expires_at: expires,
    })))
}
