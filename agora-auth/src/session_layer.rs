use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::cookies::{header_value, session_cookie, sets_cookie, SESSION_COOKIE};
use crate::AppState;

/// Authenticates the request once and exposes the result to handlers as an
/// `AuthUser` extension. A validated session slides forward in the store,
/// so the cookie is re-issued with the new expiry unless the handler has
/// set or cleared it itself.
pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let headers = req.headers().clone();
    let resolved = match state.blocking(move |s| s.authenticator.resolve(&headers)).await {
        Ok(resolved) => resolved,
        Err(e) => return e.into_response(),
    };

    let Some((session, user)) = resolved else {
        return next.run(req).await;
    };
    req.extensions_mut().insert(user);

    let mut response = next.run(req).await;
    if !sets_cookie(response.headers(), SESSION_COOKIE) {
        let cookie = session_cookie(&session.token, session.expiry, state.config.cookie_secure);
        match header_value(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => return e.into_response(),
        }
    }
    response
}
