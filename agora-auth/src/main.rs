use std::sync::Arc;
use std::time::Duration;

use agora_auth::config::{AppConfig, StoreBackend};
use agora_auth::store::{IdentityStore, MemoryStore, PgStore};
use agora_auth::{build_router, AppState};
use agora_shared::clients::db::create_pool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    agora_shared::middleware::init_tracing("agora-auth");

    let config = AppConfig::load()?;
    let port = config.port;

    let store: Arc<dyn IdentityStore> = match config.store {
        StoreBackend::Postgres => {
            let pool = create_pool(
                &config.database_url,
                config.db_pool_size,
                Duration::from_secs(config.db_connection_timeout_secs),
                config.query_timeouts(),
            )?;
            let store = PgStore::new(pool);
            store.bootstrap()?;
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store, all data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let metrics_handle = agora_shared::middleware::init_metrics()?;
    let state = Arc::new(AppState::new(config, store, Some(metrics_handle))?);

    if let Some(password) = state.config.admin_password.clone() {
        let email = state.config.admin_email.clone();
        let username = state.config.admin_username.clone();
        state
            .blocking(move |s| s.accounts.ensure_admin(&email, &username, &password))
            .await
            .map_err(|e| anyhow::anyhow!("admin seeding failed: {e}"))?;
    }

    state
        .sessions
        .clone()
        .spawn_purge_task(Duration::from_secs(state.config.session_purge_interval_secs.max(1)));

    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "agora-auth starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
