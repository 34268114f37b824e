//! System API endpoints.
//!
//! Provides aggregate statistics and a diagnostic status view.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use proxima_core::{HealthStatus, SystemStats};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Creates the system router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/system-stats", get(get_system_stats))
        .route("/status", get(get_status))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Diagnostic status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "version": "0.1.0",
    "uptime_secs": 3600,
    "devices": 7,
    "priority_devices": 2,
    "notifications": 12,
    "subscribers": 1,
    "health": {
        "healthy": true,
        "scanner": {"active": true, "healthy": true, "last_seen": "2025-01-15T03:30:00Z",
            "seconds_since_last_seen": 4, "submissions": 720},
        "notifier": {"active": false, "healthy": true, "last_seen": "2025-01-15T03:28:30Z",
            "seconds_since_last_seen": 94, "submissions": 41},
        "total_submissions": 761,
        "started_at": "2025-01-15T02:30:00Z",
        "uptime_secs": 3600
    }
}))]
pub struct SystemStatusResponse {
    /// Server version.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Server uptime in seconds.
    #[schema(example = 3600)]
    pub uptime_secs: i64,

    /// Devices currently tracked.
    #[schema(example = 7)]
    pub devices: usize,

    /// Addresses in the priority index.
    #[schema(example = 2)]
    pub priority_devices: usize,

    /// Stored notifications.
    #[schema(example = 12)]
    pub notifications: usize,

    /// Connected real-time viewers.
    #[schema(example = 1)]
    pub subscribers: usize,

    /// Producer liveness.
    pub health: HealthStatus,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get aggregate statistics.
#[utoipa::path(
    get,
    path = "/system-stats",
    tag = "system",
    operation_id = "getSystemStats",
    summary = "Get aggregate statistics",
    description = "Returns device counts, the distance histogram (close, medium, far, \
        unknown), priority devices in range, notification and viewer counts, and \
        producer liveness. The same payload is pushed to viewers periodically.",
    responses(
        (status = 200, description = "Statistics computed", body = SystemStats)
    )
)]
pub async fn get_system_stats(State(state): State<SharedState>) -> Json<SystemStats> {
    let stats = state.read().await.stats();
    Json(stats)
}

/// Get diagnostic status.
#[utoipa::path(
    get,
    path = "/status",
    tag = "system",
    operation_id = "getStatus",
    summary = "Get diagnostic status",
    description = "Returns the server version, uptime, state sizes and detailed producer \
        liveness.",
    responses(
        (status = 200, description = "Status retrieved", body = SystemStatusResponse)
    )
)]
pub async fn get_status(State(state): State<SharedState>) -> Json<SystemStatusResponse> {
    let hub = state.read().await;
    let health = hub.health_status();

    Json(SystemStatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: health.uptime_secs,
        devices: hub.devices().len(),
        priority_devices: hub.priority_addresses().len(),
        notifications: hub.notification_count(),
        subscribers: hub.subscriber_count(),
        health,
    })
}
