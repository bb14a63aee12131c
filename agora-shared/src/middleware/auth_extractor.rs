use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::AuthUser;

// The session layer of the identity service validates the session cookie
// once per request and stores the resulting `AuthUser` in the request
// extensions. These extractors only read it back.

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "login required"))
    }
}

/// Require Admin role
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::new(ErrorCode::Forbidden, "admin access required"));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::auth::UserRole;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use chrono::Utc;
    use tower::ServiceExt;

    fn user(role: UserRole) -> AuthUser {
        AuthUser {
            id: 7,
            username: Some("alice".into()),
            role,
            session_expires_at: Utc::now(),
        }
    }

    fn app() -> Router {
        Router::new()
            .route("/me", get(|user: AuthUser| async move { user.id.to_string() }))
            .route("/admin", get(|AdminUser(admin): AdminUser| async move { admin.id.to_string() }))
    }

    async fn status_of(request: Request<Body>) -> StatusCode {
        app().oneshot(request).await.unwrap().into_response().status()
    }

    fn request(path: &str, identity: Option<AuthUser>) -> Request<Body> {
        let mut request = Request::builder().uri(path).body(Body::empty()).unwrap();
        if let Some(identity) = identity {
            request.extensions_mut().insert(identity);
        }
        request
    }

    #[tokio::test]
    async fn anonymous_request_is_rejected_by_required_extractor() {
        assert_eq!(status_of(request("/me", None)).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn identity_in_extensions_is_accepted() {
        assert_eq!(status_of(request("/me", Some(user(UserRole::User)))).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_extractor_checks_role() {
        assert_eq!(status_of(request("/admin", Some(user(UserRole::User)))).await, StatusCode::FORBIDDEN);
        assert_eq!(status_of(request("/admin", Some(user(UserRole::Admin)))).await, StatusCode::OK);
    }
}
