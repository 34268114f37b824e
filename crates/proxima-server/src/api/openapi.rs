//! OpenAPI specification generation for the proxima API.
//!
//! The document is served at `/openapi.json`, browsable at `/swagger-ui`,
//! and written to the workspace root by the `gen-openapi` binary.

use utoipa::OpenApi;

use proxima_core::{
    AlertLevel, DeviceRecord, DistanceHistogram, HealthStatus, Notification, NotificationOrigin,
    ProducerHealth, ProducerRole, RawNotification, RawReading, SystemAlert, SystemStats,
};

use super::devices::{
    DevicesResponse, PriorityDevicesResponse, SetPriorityRequest, SetPriorityResponse,
    SubmitDevicesRequest, SubmitDevicesResponse,
};
use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::notifications::{
    ClearNotificationsResponse, CreateNotificationResponse, NotificationsResponse,
};
use super::system::SystemStatusResponse;

/// Returns the OpenAPI specification as pretty-printed JSON.
/// Used by the gen-openapi binary.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for proxima.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "proxima API",
        version = "0.1.0",
        description = r#"
# proxima API

proxima collects Bluetooth Low Energy proximity telemetry and fans the
resulting state out to viewers in real time.

## Producers

- **Scanner** posts batches of readings to `POST /devices`. Each reading
  refreshes a device record; devices not seen for two minutes are evicted.
- **Notifier** posts connection and disconnection events to
  `POST /notifications`.

Both are tracked for liveness: `/health` reports `degraded` when either has
been silent for longer than the healthy window.

## Viewers

- Flag devices with `POST /set-priority`. When a priority device is evicted
  a `disconnection` notification with origin `system-timeout` is recorded.
- Connect to `GET /ws` for `initial-state` followed by live updates.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local proxima server")
    ),
    tags(
        (
            name = "system",
            description = "Health checks, diagnostics and aggregate statistics"
        ),
        (
            name = "devices",
            description = "Scanner readings, the device snapshot and priority flags"
        ),
        (
            name = "notifications",
            description = "Connection and disconnection history"
        ),
        (
            name = "realtime",
            description = "WebSocket channel for live updates"
        )
    ),
    paths(
        // Health and system endpoints
        super::health::health_check,
        super::system::get_system_stats,
        super::system::get_status,
        // Device endpoints
        super::devices::submit_devices,
        super::devices::get_devices,
        super::devices::get_priority_devices,
        super::devices::set_priority,
        // Notification endpoints
        super::notifications::create_notification,
        super::notifications::get_notifications,
        super::notifications::clear_notifications,
        // Real-time channel
        super::realtime::ws_handler,
    ),
    components(
        schemas(
            // Error types
            ErrorResponse,
            // Health and system types
            HealthResponse,
            SystemStatusResponse,
            SystemStats,
            DistanceHistogram,
            HealthStatus,
            ProducerHealth,
            ProducerRole,
            SystemAlert,
            AlertLevel,
            // Device types
            RawReading,
            DeviceRecord,
            SubmitDevicesRequest,
            SubmitDevicesResponse,
            DevicesResponse,
            PriorityDevicesResponse,
            SetPriorityRequest,
            SetPriorityResponse,
            // Notification types
            RawNotification,
            Notification,
            NotificationOrigin,
            CreateNotificationResponse,
            NotificationsResponse,
            ClearNotificationsResponse,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "proxima API");
        assert!(spec.paths.paths.contains_key("/devices"));
        assert!(spec.paths.paths.contains_key("/ws"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_json().unwrap();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("\"proxima API\""));
    }
}
