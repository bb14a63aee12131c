use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post, put};
use axum::{middleware, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use agora_shared::errors::AppResult;
use agora_shared::middleware::metrics_middleware;

pub mod config;
pub mod cookies;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod session_layer;
pub mod store;

use config::AppConfig;
use services::accounts::Accounts;
use services::authenticator::Authenticator;
use services::oauth::OAuthBridge;
use services::session::SessionManager;
use services::AuthResult;
use store::IdentityStore;

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn IdentityStore>,
    pub sessions: SessionManager,
    pub oauth: OAuthBridge,
    pub accounts: Accounts,
    pub authenticator: Authenticator,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn IdentityStore>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> anyhow::Result<Self> {
        let sessions = SessionManager::new(store.clone(), Duration::from_secs(config.session_ttl_secs));
        let oauth = OAuthBridge::new(&config, store.clone())?;
        let accounts = Accounts::new(store.clone(), sessions.clone());
        let authenticator = Authenticator::new(store.clone(), sessions.clone());
        Ok(Self {
            config,
            store,
            sessions,
            oauth,
            accounts,
            authenticator,
            metrics_handle,
        })
    }

    /// Runs synchronous store work on the blocking pool.
    pub async fn blocking<T, F>(self: &Arc<Self>, f: F) -> AppResult<T>
    where
        F: FnOnce(&AppState) -> AuthResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        let result = tokio::task::spawn_blocking(move || f(&state))
            .await
            .map_err(anyhow::Error::from)?;
        Ok(result?)
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);
    let api = Router::new()
        .route("/register", post(routes::register::register))
        .route("/login", post(routes::login::login))
        .route("/logout", post(routes::logout::logout))
        .route("/me", get(routes::me::me))
        .route("/:provider/login", get(routes::oauth::begin_login))
        .route("/:provider/register", get(routes::oauth::begin_register))
        .route("/:provider/callback", get(routes::oauth::callback))
        .route("/admin/users", get(routes::admin::list_users))
        .route("/admin/users/:id", get(routes::admin::get_user))
        .route("/admin/users/:id", delete(routes::admin::delete_user))
        .route("/admin/users/:id/role", put(routes::admin::set_role))
        .route("/admin/bans", post(routes::admin::ban_email))
        .layer(middleware::from_fn_with_state(state.clone(), session_layer::session_layer));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .merge(api)
        .layer(middleware::from_fn(metrics_middleware))
        // 408 once a request outlives its budget
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
