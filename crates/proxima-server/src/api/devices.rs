//! Device ingestion and priority API endpoints.
//!
//! The scanner producer posts batches of readings here. Viewers read the
//! device snapshot and flag addresses whose loss should be announced.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use proxima_core::{DeviceAddress, DeviceRecord, RawReading};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::api::extract::ApiJson;
use crate::state::SharedState;

/// Creates the devices router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/devices", get(get_devices).post(submit_devices))
        .route("/priority-devices", get(get_priority_devices))
        .route("/set-priority", post(set_priority))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A batch of readings from the scanner.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "source": "scanner-livingroom",
    "devices": [
        {"address": "AA:BB:CC:DD:EE:01", "name": "Galaxy Buds", "rssi": -59},
        {"address": "AA:BB:CC:DD:EE:02", "distance": 3.5}
    ]
}))]
pub struct SubmitDevicesRequest {
    /// Producer identifier. Defaults to `scanner`.
    #[schema(example = "scanner-livingroom")]
    #[serde(default)]
    pub source: Option<String>,

    /// Readings to apply. Rejected as a whole if any is malformed.
    pub devices: Vec<RawReading>,
}

/// Outcome of a scanner submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": true,
    "received": 2,
    "total_devices": 7,
    "evicted": 1
}))]
pub struct SubmitDevicesResponse {
    /// Always true on a 200 response.
    #[schema(example = true)]
    pub success: bool,

    /// Readings applied.
    #[schema(example = 2)]
    pub received: usize,

    /// Devices tracked after the batch.
    #[schema(example = 7)]
    pub total_devices: usize,

    /// Stale devices removed while handling the batch.
    #[schema(example = 1)]
    pub evicted: usize,
}

/// Current device snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "devices": [],
    "count": 0,
    "scanner_active": true,
    "notifier_active": false,
    "timestamp": "2025-01-15T03:30:00Z"
}))]
pub struct DevicesResponse {
    /// Every tracked device, ordered by address.
    pub devices: Vec<DeviceRecord>,

    /// Number of devices.
    #[schema(example = 0)]
    pub count: usize,

    /// Scanner submitted within the active window.
    #[schema(example = true)]
    pub scanner_active: bool,

    /// Notifier submitted within the active window.
    #[schema(example = false)]
    pub notifier_active: bool,

    /// When the snapshot was taken.
    #[schema(example = "2025-01-15T03:30:00Z")]
    pub timestamp: DateTime<Utc>,
}

/// Every priority address.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "addresses": ["AA:BB:CC:DD:EE:01"],
    "count": 1
}))]
pub struct PriorityDevicesResponse {
    /// Sorted priority addresses, including ones not currently tracked.
    pub addresses: Vec<DeviceAddress>,

    /// Number of addresses.
    #[schema(example = 1)]
    pub count: usize,
}

/// Request body for flagging or unflagging an address.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "address": "AA:BB:CC:DD:EE:01",
    "is_priority": true
}))]
pub struct SetPriorityRequest {
    /// Hardware address. Case-insensitive.
    #[schema(example = "AA:BB:CC:DD:EE:01")]
    pub address: String,

    /// New membership.
    #[schema(example = true)]
    pub is_priority: bool,
}

/// Response after a priority toggle.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": true,
    "address": "AA:BB:CC:DD:EE:01",
    "is_priority": true,
    "total_priority": 1
}))]
pub struct SetPriorityResponse {
    /// Always true on a 200 response.
    #[schema(example = true)]
    pub success: bool,

    /// Normalized address.
    pub address: DeviceAddress,

    /// Membership after the toggle.
    #[schema(example = true)]
    pub is_priority: bool,

    /// Size of the priority index after the toggle.
    #[schema(example = 1)]
    pub total_priority: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a batch of device readings.
#[utoipa::path(
    post,
    path = "/devices",
    tag = "devices",
    operation_id = "submitDevices",
    summary = "Submit scanner readings",
    description = "Applies a batch of readings from the scanner producer. Each reading \
        creates or refreshes a device record; the distance comes from the explicit value, \
        else from RSSI, else the configured default. Devices not seen for the inline \
        threshold are evicted afterwards, and a priority device that is evicted produces \
        a disconnection notification. The whole batch is rejected if any reading is \
        malformed.",
    request_body = SubmitDevicesRequest,
    responses(
        (status = 200, description = "Batch applied", body = SubmitDevicesResponse),
        (status = 400, description = "Malformed batch; nothing applied", body = ErrorResponse)
    )
)]
pub async fn submit_devices(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<SubmitDevicesRequest>,
) -> ApiResult<Json<SubmitDevicesResponse>> {
    let report = state
        .write()
        .await
        .ingest_readings(request.devices, request.source.as_deref())?;

    Ok(Json(SubmitDevicesResponse {
        success: true,
        received: report.received,
        total_devices: report.total_devices,
        evicted: report.evicted,
    }))
}

/// Get every tracked device.
#[utoipa::path(
    get,
    path = "/devices",
    tag = "devices",
    operation_id = "getDevices",
    summary = "List tracked devices",
    description = "Returns the last-known state of every device seen within the eviction \
        window, ordered by address, with producer activity flags.",
    responses(
        (status = 200, description = "Device snapshot", body = DevicesResponse)
    )
)]
pub async fn get_devices(State(state): State<SharedState>) -> Json<DevicesResponse> {
    let snapshot = state.read().await.device_snapshot();

    Json(DevicesResponse {
        count: snapshot.count,
        devices: snapshot.devices,
        scanner_active: snapshot.health.scanner_active,
        notifier_active: snapshot.health.notifier_active,
        timestamp: snapshot.timestamp,
    })
}

/// Get every priority address.
#[utoipa::path(
    get,
    path = "/priority-devices",
    tag = "devices",
    operation_id = "getPriorityDevices",
    summary = "List priority addresses",
    description = "Returns every address flagged as priority. Membership is independent of \
        whether the device is currently tracked.",
    responses(
        (status = 200, description = "Priority addresses", body = PriorityDevicesResponse)
    )
)]
pub async fn get_priority_devices(
    State(state): State<SharedState>,
) -> Json<PriorityDevicesResponse> {
    let addresses = state.read().await.priority_addresses();

    Json(PriorityDevicesResponse {
        count: addresses.len(),
        addresses,
    })
}

/// Flag or unflag an address as priority.
#[utoipa::path(
    post,
    path = "/set-priority",
    tag = "devices",
    operation_id = "setPriority",
    summary = "Toggle priority for an address",
    description = "Adds the address to, or removes it from, the priority index. The address \
        does not need to be tracked. Every connected viewer receives a priority-update event.",
    request_body = SetPriorityRequest,
    responses(
        (status = 200, description = "Priority updated", body = SetPriorityResponse),
        (status = 400, description = "Malformed address", body = ErrorResponse)
    )
)]
pub async fn set_priority(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<SetPriorityRequest>,
) -> ApiResult<Json<SetPriorityResponse>> {
    let update = state
        .write()
        .await
        .set_priority(&request.address, request.is_priority)?;

    Ok(Json(SetPriorityResponse {
        success: true,
        total_priority: update.priority_addresses.len(),
        address: update.address,
        is_priority: update.is_priority,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_request_source_is_optional() {
        let request: SubmitDevicesRequest = serde_json::from_str(
            r#"{"devices":[{"address":"AA:BB:CC:DD:EE:01","rssi":-60}]}"#,
        )
        .unwrap();
        assert!(request.source.is_none());
        assert_eq!(request.devices.len(), 1);
    }

    #[test]
    fn test_set_priority_response_serialization() {
        let response = SetPriorityResponse {
            success: true,
            address: DeviceAddress::parse("aa:bb:cc:dd:ee:01").unwrap(),
            is_priority: true,
            total_priority: 1,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"address\":\"AA:BB:CC:DD:EE:01\""));
        assert!(json.contains("\"total_priority\":1"));
    }
}
