//! Aggregate statistics for dashboards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::distance::{DistanceBucket, DistanceModel};
use crate::health::HealthStatus;
use crate::registry::DeviceRecord;

/// Device counts per distance bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DistanceHistogram {
    /// At or below the near threshold.
    pub close: usize,
    /// Up to 5.0 units.
    pub medium: usize,
    /// Beyond 5.0 units.
    pub far: usize,
    /// Distance unknown (RSSI unavailable).
    pub unknown: usize,
}

impl DistanceHistogram {
    /// Count `records` per bucket.
    #[must_use]
    pub fn from_records(records: &[DeviceRecord], model: &DistanceModel) -> Self {
        records
            .iter()
            .fold(Self::default(), |mut histogram, record| {
                match model.bucket(record.distance) {
                    DistanceBucket::Close => histogram.close += 1,
                    DistanceBucket::Medium => histogram.medium += 1,
                    DistanceBucket::Far => histogram.far += 1,
                    DistanceBucket::Unknown => histogram.unknown += 1,
                }
                histogram
            })
    }
}

/// Service-wide counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SystemStats {
    /// Devices currently tracked.
    pub total_devices: usize,
    /// Addresses in the priority index.
    pub priority_devices: usize,
    /// Tracked priority devices within the near threshold.
    pub priority_in_range: usize,
    /// Distance histogram of tracked devices.
    pub distance: DistanceHistogram,
    /// Stored notifications.
    pub notifications: usize,
    /// Connected real-time viewers.
    pub subscribers: usize,
    /// Average producer submissions per minute since start.
    pub submissions_per_minute: f64,
    /// Producer liveness.
    pub health: HealthStatus,
    /// Resident set size of the server process in KiB, when the platform
    /// exposes it.
    pub memory_rss_kb: Option<u64>,
    /// When these numbers were computed.
    pub generated_at: DateTime<Utc>,
}

/// Inputs for [`SystemStats::compute`] that live outside the registry.
#[derive(Debug, Clone, Copy)]
pub struct StatsContext {
    /// Addresses in the priority index.
    pub priority_devices: usize,
    /// Stored notifications.
    pub notifications: usize,
    /// Connected viewers.
    pub subscribers: usize,
    /// Resident memory of the process in KiB.
    pub memory_rss_kb: Option<u64>,
}

/// Resident set size of this process in KiB, read from `/proc/self/status`.
#[cfg(target_os = "linux")]
#[must_use]
pub fn resident_memory_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

/// Resident set size of this process in KiB. Not available here.
#[cfg(not(target_os = "linux"))]
#[must_use]
pub fn resident_memory_kb() -> Option<u64> {
    None
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

impl SystemStats {
    /// Derive stats from a device snapshot.
    #[must_use]
    pub fn compute(
        records: &[DeviceRecord],
        model: &DistanceModel,
        context: StatsContext,
        health: HealthStatus,
        now: DateTime<Utc>,
    ) -> Self {
        let priority_in_range = records
            .iter()
            .filter(|record| record.is_priority && model.is_near(record.distance))
            .count();

        #[allow(clippy::cast_precision_loss)]
        let submissions_per_minute = if health.uptime_secs > 0 {
            health.total_submissions as f64 * 60.0 / health.uptime_secs as f64
        } else {
            0.0
        };

        Self {
            total_devices: records.len(),
            priority_devices: context.priority_devices,
            priority_in_range,
            distance: DistanceHistogram::from_records(records, model),
            notifications: context.notifications,
            subscribers: context.subscribers,
            submissions_per_minute,
            health,
            memory_rss_kb: context.memory_rss_kb,
            generated_at: now,
        }
    }
}
