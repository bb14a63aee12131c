use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use agora_shared::{HealthCheck, HealthResponse, HealthStatus};
use std::sync::Arc;

use crate::AppState;

/// Liveness plus a store round trip.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let store = state.clone();
    let check = match tokio::task::spawn_blocking(move || store.store.ping()).await {
        Ok(Ok(())) => HealthCheck::healthy("store"),
        Ok(Err(e)) => HealthCheck::unhealthy("store", e.to_string()),
        Err(e) => HealthCheck::unhealthy("store", e.to_string()),
    };

    let response = HealthResponse::healthy("agora-auth", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![check]);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics_handle {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
