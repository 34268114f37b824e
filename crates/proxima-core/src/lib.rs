//! # proxima-core
//!
//! State engine for the proxima BLE proximity telemetry service.
//!
//! This crate provides:
//! - A device registry with staleness eviction
//! - RSSI-based distance estimation
//! - A priority index that outlives device records
//! - A bounded, newest-first notification log
//! - Producer health monitoring
//! - Fan-out of state changes to real-time viewers
//!
//! ## Architecture
//!
//! [`Hub`] owns every piece of state and is the only way to change it. The
//! building blocks it composes are usable on their own:
//!
//! - [`registry`] - Last-known device state and stale eviction
//! - [`distance`] - Path-loss distance model and range buckets
//! - [`priority`] - Addresses flagged for loss alerts
//! - [`notifications`] - Connection/disconnection history
//! - [`health`] - Producer liveness windows and alerts
//! - [`broadcast`] - Per-viewer event queues
//! - [`events`] - Real-time message types for both directions
//! - [`stats`] - Aggregate counters
//! - [`schedule`] - Due-time bookkeeping for maintenance jobs
//! - [`clock`] - Injectable time source
//! - [`config`] - Layered configuration loading and validation
//! - [`error`] - Unified error types for the crate

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod address;
pub mod broadcast;
pub mod clock;
pub mod config;
pub mod distance;
pub mod error;
pub mod events;
pub mod health;
pub mod hub;
pub mod notifications;
pub mod priority;
pub mod registry;
pub mod schedule;
pub mod stats;

// Re-export primary types for convenience
pub use address::{is_valid_mac_address, DeviceAddress};
pub use broadcast::{Broadcaster, Frame, SubscriberId, Subscription};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigError, ConfigResult};
pub use distance::{DistanceBucket, DistanceModel, UNKNOWN_DISTANCE};
pub use error::{ProximaError, Result};
pub use events::{
    ClientCommand, DeviceSnapshot, InitialState, NotificationsCleared, NotificationsSnapshot,
    PriorityUpdate, ServerEvent,
};
pub use health::{
    AlertLevel, HealthFlags, HealthMonitor, HealthStatus, ProducerHealth, ProducerRole,
    SystemAlert,
};
pub use hub::{Hub, IngestReport, JobReport, SweepReport, DEFAULT_SOURCE};
pub use notifications::{
    EventType, NewNotification, Notification, NotificationLog, NotificationOrigin,
    RawNotification,
};
pub use priority::PriorityIndex;
pub use registry::{DeviceRecord, DeviceRegistry, RawReading, Reading};
pub use schedule::{Job, Schedule};
pub use stats::{DistanceHistogram, SystemStats};
