use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use agora_shared::errors::{AppError, AppResult, ErrorCode};
use agora_shared::middleware::AdminUser;
use agora_shared::types::auth::UserRole;
use agora_shared::types::ApiResponse;

use crate::models::User;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BanRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct BanResponse {
    pub email: String,
}

pub async fn list_users(
    AdminUser(_admin): AdminUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<User>>>> {
    let users = state.blocking(|s| s.accounts.users()).await?;
    Ok(Json(ApiResponse::ok(users)))
}

pub async fn get_user(
    AdminUser(_admin): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = state.blocking(move |s| s.accounts.user(id)).await?;
    Ok(Json(ApiResponse::ok(user)))
}

pub async fn set_role(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<SetRoleRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    if id == admin.id && req.role != UserRole::Admin {
        return Err(AppError::bad_request("cannot demote yourself"));
    }
    let user = state.blocking(move |s| s.accounts.set_role(id, req.role)).await?;
    tracing::info!(admin_id = admin.id, user_id = id, role = %user.role, "admin changed role");
    Ok(Json(ApiResponse::ok(user)))
}

/// Deletes the account with all its sessions and bans its e-mail.
pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<User>>> {
    if id == admin.id {
        return Err(AppError::bad_request("cannot delete yourself"));
    }
    let user = state.blocking(move |s| s.accounts.delete_and_ban(id)).await?;
    tracing::info!(admin_id = admin.id, user_id = id, "admin deleted user");
    Ok(Json(ApiResponse::ok_with_message(user, "user deleted and banned")))
}

pub async fn ban_email(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<BanRequest>,
) -> AppResult<Json<ApiResponse<BanResponse>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let email = state.blocking(move |s| s.accounts.ban_email(&req.email)).await?;
    tracing::info!(admin_id = admin.id, "admin banned identity");
    Ok(Json(ApiResponse::ok(BanResponse { email })))
}
