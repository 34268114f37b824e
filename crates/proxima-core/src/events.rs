//! Real-time channel messages.
//!
//! Both directions are closed enums. On the wire every message is a JSON
//! object whose `event` field names the variant in kebab-case; outbound
//! payloads sit under `data`:
//!
//! ```json
//! {"event": "priority-update", "data": {"address": "AA:BB:CC:DD:EE:01", ...}}
//! {"event": "request-devices"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::address::DeviceAddress;
use crate::error::Result;
use crate::health::{HealthFlags, SystemAlert};
use crate::notifications::Notification;
use crate::registry::DeviceRecord;
use crate::stats::SystemStats;

/// Composite state sent once to every newly connected viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InitialState {
    /// Every tracked device.
    pub devices: Vec<DeviceRecord>,
    /// Every priority address.
    pub priority_addresses: Vec<DeviceAddress>,
    /// Most recent notifications, newest first.
    pub notifications: Vec<Notification>,
    /// Producer liveness.
    pub health: HealthFlags,
    /// When the state was captured.
    pub timestamp: DateTime<Utc>,
}

/// Full device list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeviceSnapshot {
    /// Every tracked device.
    pub devices: Vec<DeviceRecord>,
    /// Number of devices.
    pub count: usize,
    /// Producer liveness.
    pub health: HealthFlags,
    /// When the snapshot was captured.
    pub timestamp: DateTime<Utc>,
}

/// A priority toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PriorityUpdate {
    /// Address that was toggled.
    pub address: DeviceAddress,
    /// New membership.
    pub is_priority: bool,
    /// Every priority address after the toggle.
    pub priority_addresses: Vec<DeviceAddress>,
}

/// The notification log was emptied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NotificationsCleared {
    /// Entries discarded.
    pub cleared: usize,
    /// When the log was cleared.
    pub timestamp: DateTime<Utc>,
}

/// Most recent notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationsSnapshot {
    /// Newest first.
    pub notifications: Vec<Notification>,
    /// Entries in the whole log.
    pub total: usize,
}

/// Server-to-viewer message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Sent once on connect.
    InitialState(InitialState),
    /// Device list changed.
    DeviceSnapshotUpdate(DeviceSnapshot),
    /// Priority membership changed.
    PriorityUpdate(PriorityUpdate),
    /// A notification was appended.
    NotificationCreated(Notification),
    /// The notification log was cleared.
    NotificationsCleared(NotificationsCleared),
    /// Recent notifications, after retention purge or on request.
    NotificationsSnapshot(NotificationsSnapshot),
    /// Aggregate stats.
    SystemStatsUpdate(SystemStats),
    /// A producer is offline.
    SystemAlert(SystemAlert),
}

impl ServerEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InitialState(_) => "initial-state",
            Self::DeviceSnapshotUpdate(_) => "device-snapshot-update",
            Self::PriorityUpdate(_) => "priority-update",
            Self::NotificationCreated(_) => "notification-created",
            Self::NotificationsCleared(_) => "notifications-cleared",
            Self::NotificationsSnapshot(_) => "notifications-snapshot",
            Self::SystemStatsUpdate(_) => "system-stats-update",
            Self::SystemAlert(_) => "system-alert",
        }
    }

    /// Encode as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProximaError::Serialization`] if encoding fails.
    ///
    /// [`ProximaError::Serialization`]: crate::error::ProximaError::Serialization
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Viewer-to-server request. Each is answered only to the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientCommand {
    /// Reply with a device snapshot.
    RequestDevices,
    /// Reply with recent notifications.
    RequestNotifications,
    /// Reply with system stats.
    RequestSystemStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_commands_parse() {
        let cmd: ClientCommand = serde_json::from_str(r#"{"event":"request-devices"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::RequestDevices);
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"event":"request-system-stats"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::RequestSystemStats);
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(serde_json::from_str::<ClientCommand>(r#"{"event":"drop-tables"}"#).is_err());
    }

    #[test]
    fn test_server_event_wire_shape() {
        let event = ServerEvent::NotificationsCleared(NotificationsCleared {
            cleared: 3,
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
        });
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["event"], event.name());
        assert_eq!(value["data"]["cleared"], 3);
    }
}
