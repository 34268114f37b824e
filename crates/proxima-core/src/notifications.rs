//! Bounded, newest-first history of proximity events.
//!
//! Entries come from two places: the threshold notifier producer reports
//! events explicitly, and the registry synthesizes a `disconnection` when a
//! priority device times out. The log keeps at most `capacity` entries and
//! the maintenance sweep drops entries older than the retention window.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::address::DeviceAddress;
use crate::error::{ProximaError, Result};
use crate::registry::DeviceRecord;

/// Kind of proximity event. Producers may send kinds beyond the known ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// A device came into range.
    Connection,
    /// A device left range or timed out.
    Disconnection,
    /// Any producer-defined kind.
    Other(String),
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "connection" => Self::Connection,
            "disconnection" => Self::Disconnection,
            _ => Self::Other(value),
        }
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        match value {
            EventType::Connection => "connection".to_string(),
            EventType::Disconnection => "disconnection".to_string(),
            EventType::Other(other) => other,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => f.write_str("connection"),
            Self::Disconnection => f.write_str("disconnection"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

/// Who created a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationOrigin {
    /// Sent by the threshold notifier producer.
    ProducerReported,
    /// Synthesized when a priority device timed out.
    SystemTimeout,
}

/// A stored notification. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "01946a3c-8f2e-7b4a-9c1d-2e3f4a5b6c7d",
    "address": "AA:BB:CC:DD:EE:01",
    "device_name": "Galaxy Buds",
    "event_type": "disconnection",
    "timestamp": "2025-01-15T03:30:00Z",
    "received_at": "2025-01-15T03:30:00Z",
    "origin": "system-timeout"
}))]
pub struct Notification {
    /// Time-ordered unique id.
    pub id: Uuid,

    /// Device the event is about.
    pub address: DeviceAddress,

    /// Display name, falling back to the address.
    pub device_name: String,

    /// Event kind.
    #[schema(value_type = String, example = "disconnection")]
    pub event_type: EventType,

    /// When the event happened.
    pub timestamp: DateTime<Utc>,

    /// When the server recorded it.
    pub received_at: DateTime<Utc>,

    /// Who created it.
    pub origin: NotificationOrigin,
}

/// Notification body as submitted by the notifier producer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "address": "AA:BB:CC:DD:EE:01",
    "name": "Galaxy Buds",
    "event_type": "connection"
}))]
pub struct RawNotification {
    /// Hardware address of the device.
    #[schema(example = "AA:BB:CC:DD:EE:01")]
    pub address: String,

    /// Display name of the device.
    #[serde(default)]
    pub name: Option<String>,

    /// Event kind, e.g. `connection` or `disconnection`.
    #[schema(example = "connection")]
    pub event_type: String,

    /// When the event happened; the server receipt time when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A notification waiting to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    /// Device the event is about.
    pub address: DeviceAddress,
    /// Display name, if known.
    pub device_name: Option<String>,
    /// Event kind.
    pub event_type: EventType,
    /// When the event happened, if the producer said.
    pub occurred_at: Option<DateTime<Utc>>,
    /// Who created it.
    pub origin: NotificationOrigin,
}

impl NewNotification {
    /// Validate a producer-submitted notification.
    ///
    /// # Errors
    ///
    /// Returns [`ProximaError::InvalidNotification`] for a malformed address
    /// or an empty event type.
    pub fn from_raw(raw: RawNotification) -> Result<Self> {
        let address = DeviceAddress::parse(&raw.address).map_err(|_| {
            ProximaError::InvalidNotification(format!("malformed address '{}'", raw.address))
        })?;

        let event_type = raw.event_type.trim();
        if event_type.is_empty() {
            return Err(ProximaError::InvalidNotification(
                "event_type must not be empty".to_string(),
            ));
        }

        Ok(Self {
            address,
            device_name: raw
                .name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            event_type: EventType::from(event_type.to_string()),
            occurred_at: raw.timestamp,
            origin: NotificationOrigin::ProducerReported,
        })
    }

    /// The disconnection recorded when a priority device times out.
    #[must_use]
    pub fn timeout(record: &DeviceRecord) -> Self {
        Self {
            address: record.address.clone(),
            device_name: record.name.clone(),
            event_type: EventType::Disconnection,
            occurred_at: None,
            origin: NotificationOrigin::SystemTimeout,
        }
    }
}

/// Newest-first notification history with a fixed capacity.
#[derive(Debug)]
pub struct NotificationLog {
    entries: VecDeque<Notification>,
    capacity: usize,
}

impl NotificationLog {
    /// Create an empty log holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.saturating_add(1)),
            capacity,
        }
    }

    /// Store a notification at the head, dropping the oldest beyond capacity.
    pub fn append(&mut self, new: NewNotification, now: DateTime<Utc>) -> Notification {
        let notification = Notification {
            id: Uuid::now_v7(),
            device_name: new
                .device_name
                .unwrap_or_else(|| new.address.to_string()),
            address: new.address,
            event_type: new.event_type,
            timestamp: new.occurred_at.unwrap_or(now),
            received_at: now,
            origin: new.origin,
        };

        self.entries.push_front(notification.clone());
        self.entries.truncate(self.capacity);
        notification
    }

    /// Discard every entry. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    /// Drop entries received more than `window` before `now`.
    /// Returns how many were removed.
    pub fn purge_older_than(&mut self, now: DateTime<Utc>, window: TimeDelta) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|notification| now - notification.received_at <= window);
        before - self.entries.len()
    }

    /// Up to `limit` entries, newest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<Notification> {
        self.entries.iter().take(limit).cloned().collect()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of stored entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
