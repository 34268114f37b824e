//! Health check API endpoint.
//!
//! Provides a liveness endpoint for monitoring and load balancers. The
//! server itself is always up when this answers; `status` degrades when a
//! producer has gone quiet.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use proxima_core::ProducerHealth;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "ok",
    "version": "0.1.0",
    "uptime_secs": 3600,
    "scanner": {"active": true, "healthy": true, "last_seen": "2025-01-15T03:30:00Z",
        "seconds_since_last_seen": 4, "submissions": 720},
    "notifier": {"active": true, "healthy": true, "last_seen": "2025-01-15T03:29:50Z",
        "seconds_since_last_seen": 14, "submissions": 41}
}))]
pub struct HealthResponse {
    /// `ok` when both producers are healthy, otherwise `degraded`.
    #[schema(example = "ok")]
    pub status: String,

    /// Service version from Cargo.toml.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Seconds since the server started.
    #[schema(example = 3600)]
    pub uptime_secs: i64,

    /// Scanner liveness.
    pub scanner: ProducerHealth,

    /// Notifier liveness.
    pub notifier: ProducerHealth,
}

/// Creates the health router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/health", get(health_check))
}

/// Health check endpoint.
///
/// Always answers 200; producer problems are reported in the body.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Check service health",
    description = "Returns service status, version, uptime and producer liveness. \
        `status` is `degraded` when either producer has not submitted within the \
        healthy window.",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let health = state.read().await.health_status();

    Json(HealthResponse {
        status: if health.healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: health.uptime_secs,
        scanner: health.scanner,
        notifier: health.notifier,
    })
}
