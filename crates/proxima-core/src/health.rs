//! Producer liveness tracking.
//!
//! Two windows are derived from each producer's last contact:
//!
//! - **active** (`< active_window`, 60 s by default) is what reports show
//! - **healthy** (`< healthy_window`, 120 s by default) is what alerting uses
//!
//! The alert check is level-triggered: every evaluation while a producer is
//! unhealthy yields a fresh alert.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::{secs, HealthConfig};

/// Which telemetry producer a submission came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProducerRole {
    /// Continuous scanner submitting device batches.
    Scanner,
    /// Threshold notifier submitting explicit events.
    Notifier,
}

impl ProducerRole {
    /// Every tracked role.
    pub const ALL: [Self; 2] = [Self::Scanner, Self::Notifier];

    const fn index(self) -> usize {
        match self {
            Self::Scanner => 0,
            Self::Notifier => 1,
        }
    }

    /// Lower-case label used in logs and alert messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scanner => "scanner",
            Self::Notifier => "notifier",
        }
    }
}

/// Severity of a system alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// Something needs attention.
    Warning,
}

/// Alert raised while one or more producers are unhealthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SystemAlert {
    /// Severity.
    pub level: AlertLevel,
    /// Human-readable summary.
    #[schema(example = "Producer offline: scanner")]
    pub message: String,
    /// Producers that are not healthy.
    pub offline_producers: Vec<ProducerRole>,
    /// When the alert was raised.
    pub timestamp: DateTime<Utc>,
}

/// Liveness of one producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProducerHealth {
    /// Seen within the active window.
    pub active: bool,
    /// Seen within the healthy window.
    pub healthy: bool,
    /// Last successful submission.
    pub last_seen: Option<DateTime<Utc>>,
    /// Seconds since the last submission.
    pub seconds_since_last_seen: Option<i64>,
    /// Submissions since start.
    pub submissions: u64,
}

/// Compact per-producer flags sent to viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthFlags {
    /// Scanner seen within the active window.
    pub scanner_active: bool,
    /// Notifier seen within the active window.
    pub notifier_active: bool,
    /// Scanner seen within the healthy window.
    pub scanner_healthy: bool,
    /// Notifier seen within the healthy window.
    pub notifier_healthy: bool,
}

/// Liveness of the whole service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    /// Both producers healthy.
    pub healthy: bool,
    /// Continuous scanner.
    pub scanner: ProducerHealth,
    /// Threshold notifier.
    pub notifier: ProducerHealth,
    /// Submissions from all producers since start.
    pub total_submissions: u64,
    /// Process start.
    pub started_at: DateTime<Utc>,
    /// Seconds since start.
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, Copy, Default)]
struct ProducerContact {
    last_seen: Option<DateTime<Utc>>,
    submissions: u64,
}

/// Last-contact bookkeeping for both producers.
#[derive(Debug)]
pub struct HealthMonitor {
    started_at: DateTime<Utc>,
    contacts: [ProducerContact; 2],
    total_submissions: u64,
    active_window: TimeDelta,
    healthy_window: TimeDelta,
}

impl HealthMonitor {
    /// Start tracking at `started_at`.
    #[must_use]
    pub fn new(config: &HealthConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            contacts: [ProducerContact::default(); 2],
            total_submissions: 0,
            active_window: secs(config.active_window_secs),
            healthy_window: secs(config.healthy_window_secs),
        }
    }

    /// Record a successful submission.
    pub fn record_contact(&mut self, role: ProducerRole, now: DateTime<Utc>) {
        let contact = &mut self.contacts[role.index()];
        contact.last_seen = Some(now);
        contact.submissions += 1;
        self.total_submissions += 1;
    }

    fn within(&self, role: ProducerRole, now: DateTime<Utc>, window: TimeDelta) -> bool {
        self.contacts[role.index()]
            .last_seen
            .is_some_and(|seen| now - seen < window)
    }

    /// Whether `role` submitted within the active window.
    #[must_use]
    pub fn is_active(&self, role: ProducerRole, now: DateTime<Utc>) -> bool {
        self.within(role, now, self.active_window)
    }

    /// Whether `role` submitted within the healthy window.
    #[must_use]
    pub fn is_healthy(&self, role: ProducerRole, now: DateTime<Utc>) -> bool {
        self.within(role, now, self.healthy_window)
    }

    /// Roles outside the healthy window.
    #[must_use]
    pub fn unhealthy_producers(&self, now: DateTime<Utc>) -> Vec<ProducerRole> {
        ProducerRole::ALL
            .into_iter()
            .filter(|role| !self.is_healthy(*role, now))
            .collect()
    }

    /// Produce an alert if any producer is unhealthy.
    #[must_use]
    pub fn evaluate(&self, now: DateTime<Utc>) -> Option<SystemAlert> {
        let offline = self.unhealthy_producers(now);
        if offline.is_empty() {
            return None;
        }

        let names: Vec<&str> = offline.iter().map(|role| role.label()).collect();
        let noun = if offline.len() == 1 { "Producer" } else { "Producers" };
        Some(SystemAlert {
            level: AlertLevel::Warning,
            message: format!("{noun} offline: {}", names.join(", ")),
            offline_producers: offline,
            timestamp: now,
        })
    }

    fn producer(&self, role: ProducerRole, now: DateTime<Utc>) -> ProducerHealth {
        let contact = self.contacts[role.index()];
        ProducerHealth {
            active: self.is_active(role, now),
            healthy: self.is_healthy(role, now),
            last_seen: contact.last_seen,
            seconds_since_last_seen: contact.last_seen.map(|seen| (now - seen).num_seconds()),
            submissions: contact.submissions,
        }
    }

    /// Active and healthy flags for both producers.
    #[must_use]
    pub fn flags(&self, now: DateTime<Utc>) -> HealthFlags {
        HealthFlags {
            scanner_active: self.is_active(ProducerRole::Scanner, now),
            notifier_active: self.is_active(ProducerRole::Notifier, now),
            scanner_healthy: self.is_healthy(ProducerRole::Scanner, now),
            notifier_healthy: self.is_healthy(ProducerRole::Notifier, now),
        }
    }

    /// Full status at `now`.
    #[must_use]
    pub fn status(&self, now: DateTime<Utc>) -> HealthStatus {
        let scanner = self.producer(ProducerRole::Scanner, now);
        let notifier = self.producer(ProducerRole::Notifier, now);
        HealthStatus {
            healthy: scanner.healthy && notifier.healthy,
            scanner,
            notifier,
            total_submissions: self.total_submissions,
            started_at: self.started_at,
            uptime_secs: (now - self.started_at).num_seconds().max(0),
        }
    }

    /// Submissions from all producers since start.
    #[must_use]
    pub const fn total_submissions(&self) -> u64 {
        self.total_submissions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn monitor() -> HealthMonitor {
        HealthMonitor::new(&HealthConfig::default(), t0())
    }

    #[test]
    fn test_active_boundary_is_sixty_seconds() {
        let mut health = monitor();
        health.record_contact(ProducerRole::Scanner, t0());

        assert!(health.is_active(ProducerRole::Scanner, t0() + TimeDelta::seconds(59)));
        assert!(!health.is_active(ProducerRole::Scanner, t0() + TimeDelta::seconds(60)));
        assert!(!health.is_active(ProducerRole::Scanner, t0() + TimeDelta::seconds(61)));
    }

    #[test]
    fn test_healthy_boundary_is_one_hundred_twenty_seconds() {
        let mut health = monitor();
        health.record_contact(ProducerRole::Notifier, t0());

        assert!(health.is_healthy(ProducerRole::Notifier, t0() + TimeDelta::seconds(119)));
        assert!(!health.is_healthy(ProducerRole::Notifier, t0() + TimeDelta::seconds(121)));
        // Inactive but still healthy.
        let between = t0() + TimeDelta::seconds(90);
        assert!(!health.is_active(ProducerRole::Notifier, between));
        assert!(health.is_healthy(ProducerRole::Notifier, between));
    }

    #[test]
    fn test_never_seen_is_unhealthy() {
        let health = monitor();
        assert!(!health.is_active(ProducerRole::Scanner, t0()));
        assert_eq!(
            health.unhealthy_producers(t0()),
            vec![ProducerRole::Scanner, ProducerRole::Notifier]
        );
    }

    #[test]
    fn test_alert_is_level_triggered() {
        let mut health = monitor();
        health.record_contact(ProducerRole::Notifier, t0());
        health.record_contact(ProducerRole::Scanner, t0());
        assert!(health.evaluate(t0() + TimeDelta::seconds(30)).is_none());

        health.record_contact(ProducerRole::Notifier, t0() + TimeDelta::minutes(3));
        let first = health.evaluate(t0() + TimeDelta::minutes(3)).unwrap();
        let second = health.evaluate(t0() + TimeDelta::minutes(4)).unwrap();
        assert_eq!(first.offline_producers, vec![ProducerRole::Scanner]);
        assert_eq!(first.message, "Producer offline: scanner");
        assert_eq!(second.offline_producers, vec![ProducerRole::Scanner]);
    }

    #[test]
    fn test_status_counts_submissions() {
        let mut health = monitor();
        health.record_contact(ProducerRole::Scanner, t0());
        health.record_contact(ProducerRole::Scanner, t0() + TimeDelta::seconds(10));
        health.record_contact(ProducerRole::Notifier, t0() + TimeDelta::seconds(20));

        let status = health.status(t0() + TimeDelta::seconds(30));
        assert_eq!(status.scanner.submissions, 2);
        assert_eq!(status.notifier.submissions, 1);
        assert_eq!(status.total_submissions, 3);
        assert_eq!(status.scanner.seconds_since_last_seen, Some(20));
        assert_eq!(status.uptime_secs, 30);
        assert!(status.healthy);
    }
}
