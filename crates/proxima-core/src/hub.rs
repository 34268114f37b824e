//! The service context.
//!
//! [`Hub`] owns every piece of mutable state (registry, priority index,
//! notification log, health monitor, subscribers, schedule) and is the only
//! entry point into it. All methods are synchronous and run to completion,
//! so a caller that serializes access (the server wraps the hub in one
//! `RwLock`) never observes a half-applied change.
//!
//! Every mutation publishes the matching [`ServerEvent`] before returning.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use crate::address::DeviceAddress;
use crate::broadcast::{Broadcaster, SubscriberId, Subscription};
use crate::clock::Clock;
use crate::config::{secs, Config};
use crate::distance::DistanceModel;
use crate::error::{ProximaError, Result};
use crate::events::{
    ClientCommand, DeviceSnapshot, InitialState, NotificationsCleared, NotificationsSnapshot,
    PriorityUpdate, ServerEvent,
};
use crate::health::{HealthFlags, HealthMonitor, HealthStatus, ProducerRole, SystemAlert};
use crate::notifications::{NewNotification, Notification, NotificationLog, RawNotification};
use crate::priority::PriorityIndex;
use crate::registry::{validate_batch, DeviceRecord, DeviceRegistry, RawReading};
use crate::schedule::{Job, Schedule};
use crate::stats::{resident_memory_kb, StatsContext, SystemStats};

/// Producer id recorded when a scanner does not name itself.
pub const DEFAULT_SOURCE: &str = "scanner";

/// Result of a scanner submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Readings applied.
    pub received: usize,
    /// Readings that created a new record.
    pub created: usize,
    /// Records removed by the inline eviction pass.
    pub evicted: usize,
    /// Devices tracked afterwards.
    pub total_devices: usize,
}

/// Result of one periodic sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records removed.
    pub evicted: usize,
    /// Notifications past retention removed.
    pub purged: usize,
}

/// Result of running one [`Job`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReport {
    /// Stale sweep finished.
    Sweep(SweepReport),
    /// Health evaluated; carries the alert if one was raised.
    Health(Option<SystemAlert>),
    /// Stats pushed to this many viewers.
    Stats(usize),
}

/// Owner of all proximity state.
pub struct Hub {
    config: Config,
    clock: Arc<dyn Clock>,
    model: DistanceModel,
    registry: DeviceRegistry,
    priority: PriorityIndex,
    notifications: NotificationLog,
    health: HealthMonitor,
    broadcaster: Broadcaster,
    schedule: Schedule,
    closed: bool,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("devices", &self.registry.len())
            .field("priority", &self.priority.len())
            .field("notifications", &self.notifications.len())
            .field("subscribers", &self.broadcaster.len())
            .finish_non_exhaustive()
    }
}

impl Hub {
    /// Build an empty hub. The clock's current time is the process start.
    #[must_use]
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            model: DistanceModel::from(&config.distance),
            registry: DeviceRegistry::new(),
            priority: PriorityIndex::new(),
            notifications: NotificationLog::new(config.notifications.capacity),
            health: HealthMonitor::new(&config.health, started_at),
            broadcaster: Broadcaster::new(),
            schedule: Schedule::from_config(&config, started_at),
            config,
            clock,
            closed: false,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Current time according to the hub's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ========================================================================
    // Producer submissions
    // ========================================================================

    /// Apply a scanner batch.
    ///
    /// The batch is validated as a whole first; a single malformed reading
    /// rejects it with no state change. Afterwards the scanner's contact is
    /// recorded, stale records are evicted and the device snapshot is
    /// broadcast.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed batch, or a serialization
    /// error if an event could not be encoded (state is already updated).
    pub fn ingest_readings(
        &mut self,
        batch: Vec<RawReading>,
        source: Option<&str>,
    ) -> Result<IngestReport> {
        let readings = validate_batch(batch)?;
        let source = source
            .map(str::trim)
            .filter(|source| !source.is_empty())
            .unwrap_or(DEFAULT_SOURCE);

        let now = self.clock.now();
        let summary = self.registry.upsert(&readings, source, now, &self.model);
        self.health.record_contact(ProducerRole::Scanner, now);

        let evicted = self.evict_older_than(self.config.eviction.inline_threshold())?;
        self.publish(&ServerEvent::DeviceSnapshotUpdate(self.device_snapshot()))?;

        tracing::debug!(
            source,
            received = summary.received,
            created = summary.created,
            evicted,
            total = self.registry.len(),
            "Applied device batch"
        );

        Ok(IngestReport {
            received: summary.received,
            created: summary.created,
            evicted,
            total_devices: self.registry.len(),
        })
    }

    /// Store a notifier-reported event and broadcast it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed notification.
    pub fn report_notification(&mut self, raw: RawNotification) -> Result<Notification> {
        let new = NewNotification::from_raw(raw)?;
        let now = self.clock.now();
        self.health.record_contact(ProducerRole::Notifier, now);

        let notification = self.notifications.append(new, now);
        tracing::info!(
            id = %notification.id,
            address = %notification.address,
            event_type = %notification.event_type,
            "Notification reported"
        );
        self.publish(&ServerEvent::NotificationCreated(notification.clone()))?;
        Ok(notification)
    }

    // ========================================================================
    // Viewer commands
    // ========================================================================

    /// Flag or unflag an address. Broadcasts a priority update even when
    /// membership did not change or no record exists.
    ///
    /// # Errors
    ///
    /// Returns [`ProximaError::InvalidAddress`] for a malformed address.
    ///
    /// [`ProximaError::InvalidAddress`]: crate::error::ProximaError::InvalidAddress
    pub fn set_priority(&mut self, address: &str, is_priority: bool) -> Result<PriorityUpdate> {
        let address = DeviceAddress::parse(address)?;
        let changed = self.priority.set(&address, is_priority);
        tracing::info!(%address, is_priority, changed, "Priority toggled");

        let update = PriorityUpdate {
            address,
            is_priority,
            priority_addresses: self.priority.addresses(),
        };
        self.publish(&ServerEvent::PriorityUpdate(update.clone()))?;
        Ok(update)
    }

    /// Discard the whole notification log. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error only if the broadcast could not be encoded.
    pub fn clear_notifications(&mut self) -> Result<usize> {
        let cleared = self.notifications.clear();
        tracing::info!(cleared, "Notification log cleared");
        self.publish(&ServerEvent::NotificationsCleared(NotificationsCleared {
            cleared,
            timestamp: self.clock.now(),
        }))?;
        Ok(cleared)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Every tracked device, ordered by address.
    #[must_use]
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.registry.snapshot(&self.priority)
    }

    /// One device, if tracked.
    #[must_use]
    pub fn device(&self, address: &DeviceAddress) -> Option<DeviceRecord> {
        self.registry.get(address, &self.priority)
    }

    /// Devices plus producer flags.
    #[must_use]
    pub fn device_snapshot(&self) -> DeviceSnapshot {
        let devices = self.devices();
        DeviceSnapshot {
            count: devices.len(),
            devices,
            health: self.health_flags(),
            timestamp: self.clock.now(),
        }
    }

    /// Every priority address, sorted.
    #[must_use]
    pub fn priority_addresses(&self) -> Vec<DeviceAddress> {
        self.priority.addresses()
    }

    /// Up to `limit` notifications, newest first.
    #[must_use]
    pub fn recent_notifications(&self, limit: usize) -> Vec<Notification> {
        self.notifications.recent(limit)
    }

    /// Stored notification count.
    #[must_use]
    pub fn notification_count(&self) -> usize {
        self.notifications.len()
    }

    /// Active and healthy flags.
    #[must_use]
    pub fn health_flags(&self) -> HealthFlags {
        self.health.flags(self.clock.now())
    }

    /// Detailed producer liveness.
    #[must_use]
    pub fn health_status(&self) -> HealthStatus {
        self.health.status(self.clock.now())
    }

    /// Aggregate statistics.
    #[must_use]
    pub fn stats(&self) -> SystemStats {
        let now = self.clock.now();
        SystemStats::compute(
            &self.devices(),
            &self.model,
            StatsContext {
                priority_devices: self.priority.len(),
                notifications: self.notifications.len(),
                subscribers: self.broadcaster.len(),
                memory_rss_kb: resident_memory_kb(),
            },
            self.health.status(now),
            now,
        )
    }

    /// The composite state a new viewer receives.
    #[must_use]
    pub fn initial_state(&self) -> InitialState {
        InitialState {
            devices: self.devices(),
            priority_addresses: self.priority.addresses(),
            notifications: self.snapshot_notifications(),
            health: self.health_flags(),
            timestamp: self.clock.now(),
        }
    }

    fn snapshot_notifications(&self) -> Vec<Notification> {
        self.notifications
            .recent(self.config.notifications.snapshot_size)
    }

    fn notifications_snapshot(&self) -> NotificationsSnapshot {
        NotificationsSnapshot {
            notifications: self.snapshot_notifications(),
            total: self.notifications.len(),
        }
    }

    // ========================================================================
    // Real-time viewers
    // ========================================================================

    /// Register a viewer and queue its initial state.
    ///
    /// The initial state is the first frame on the subscription; nothing
    /// published earlier is replayed.
    ///
    /// # Errors
    ///
    /// Returns [`ProximaError::ShuttingDown`] after [`Hub::shutdown`], or an
    /// error if the initial state could not be encoded.
    pub fn connect_viewer(&mut self) -> Result<Subscription> {
        if self.closed {
            return Err(ProximaError::ShuttingDown);
        }
        let subscription = self.broadcaster.subscribe();
        let initial = ServerEvent::InitialState(self.initial_state());
        if let Err(err) = self.broadcaster.send_to(subscription.id, &initial) {
            self.broadcaster.unsubscribe(subscription.id);
            return Err(err);
        }
        tracing::info!(
            viewer = %subscription.id,
            viewers = self.broadcaster.len(),
            "Viewer connected"
        );
        Ok(subscription)
    }

    /// Forget a viewer.
    pub fn disconnect_viewer(&mut self, id: SubscriberId) {
        self.broadcaster.unsubscribe(id);
        tracing::info!(viewer = %id, viewers = self.broadcaster.len(), "Viewer disconnected");
    }

    /// The one-shot reply to a viewer command.
    #[must_use]
    pub fn reply(&self, command: ClientCommand) -> ServerEvent {
        match command {
            ClientCommand::RequestDevices => {
                ServerEvent::DeviceSnapshotUpdate(self.device_snapshot())
            }
            ClientCommand::RequestNotifications => {
                ServerEvent::NotificationsSnapshot(self.notifications_snapshot())
            }
            ClientCommand::RequestSystemStats => ServerEvent::SystemStatsUpdate(self.stats()),
        }
    }

    /// Answer a viewer command on that viewer's queue only.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply could not be encoded.
    pub fn answer(&mut self, id: SubscriberId, command: ClientCommand) -> Result<bool> {
        let reply = self.reply(command);
        self.broadcaster.send_to(id, &reply)
    }

    /// Connected viewers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.len()
    }

    /// Whether [`Hub::shutdown`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Jobs due at the current time.
    pub fn take_due_jobs(&mut self) -> Vec<Job> {
        let now = self.clock.now();
        self.schedule.take_due(now)
    }

    /// Run one maintenance job.
    ///
    /// # Errors
    ///
    /// Returns an error if a broadcast could not be encoded. Work committed
    /// before the failure stays committed.
    pub fn run_job(&mut self, job: Job) -> Result<JobReport> {
        match job {
            Job::StaleSweep => self.sweep().map(JobReport::Sweep),
            Job::HealthCheck => self.check_health().map(JobReport::Health),
            Job::StatsBroadcast => self.broadcast_stats().map(JobReport::Stats),
        }
    }

    /// Evict records past the sweep threshold and purge expired
    /// notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if a broadcast could not be encoded.
    pub fn sweep(&mut self) -> Result<SweepReport> {
        let evicted = self.evict_older_than(self.config.eviction.sweep_threshold())?;
        if evicted > 0 {
            self.publish(&ServerEvent::DeviceSnapshotUpdate(self.device_snapshot()))?;
        }

        let now = self.clock.now();
        let purged = self
            .notifications
            .purge_older_than(now, secs(self.config.notifications.retention_secs));
        if purged > 0 {
            tracing::info!(purged, "Expired notifications purged");
            self.publish(&ServerEvent::NotificationsSnapshot(
                self.notifications_snapshot(),
            ))?;
        }

        Ok(SweepReport { evicted, purged })
    }

    /// Evaluate producer health; alert viewers while anything is offline.
    ///
    /// # Errors
    ///
    /// Returns an error if the alert could not be encoded.
    pub fn check_health(&mut self) -> Result<Option<SystemAlert>> {
        let alert = self.health.evaluate(self.clock.now());
        if let Some(alert) = &alert {
            tracing::warn!(message = %alert.message, "Producer health alert");
            self.publish(&ServerEvent::SystemAlert(alert.clone()))?;
        }
        Ok(alert)
    }

    /// Push aggregate stats to every viewer.
    ///
    /// # Errors
    ///
    /// Returns an error if the stats could not be encoded.
    pub fn broadcast_stats(&mut self) -> Result<usize> {
        let stats = self.stats();
        self.publish(&ServerEvent::SystemStatsUpdate(stats))
    }

    /// Drop every viewer and refuse new ones. Their connections see the
    /// stream end.
    pub fn shutdown(&mut self) {
        self.closed = true;
        tracing::info!(viewers = self.broadcaster.len(), "Closing viewer streams");
        self.broadcaster.close_all();
    }

    /// Remove records older than `threshold`, logging a timeout
    /// notification for each priority record before it is dropped.
    fn evict_older_than(&mut self, threshold: TimeDelta) -> Result<usize> {
        let now = self.clock.now();
        let notifications = &mut self.notifications;
        let mut timeouts = Vec::new();

        let evicted = self
            .registry
            .evict_stale(now, threshold, &self.priority, |record| {
                if record.is_priority {
                    timeouts.push(notifications.append(NewNotification::timeout(record), now));
                }
            });

        for record in &evicted {
            tracing::info!(
                address = %record.address,
                is_priority = record.is_priority,
                last_update = %record.last_update,
                "Evicted stale device"
            );
        }
        for notification in timeouts {
            self.publish(&ServerEvent::NotificationCreated(notification))?;
        }

        Ok(evicted.len())
    }

    fn publish(&mut self, event: &ServerEvent) -> Result<usize> {
        self.broadcaster.publish(event)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::clock::ManualClock;
    use crate::notifications::{EventType, NotificationOrigin};

    const A: &str = "AA:BB:CC:DD:EE:01";
    const B: &str = "AA:BB:CC:DD:EE:02";

    fn hub() -> (Hub, ManualClock) {
        let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        (Hub::new(Config::default(), Arc::new(clock.clone())), clock)
    }

    fn rssi(address: &str, rssi: i32) -> RawReading {
        RawReading {
            address: address.to_string(),
            name: None,
            rssi: Some(rssi),
            distance: None,
        }
    }

    fn drain(subscription: &mut Subscription) -> Vec<serde_json::Value> {
        let mut events = Vec::new();
        while let Ok(frame) = subscription.receiver.try_recv() {
            events.push(serde_json::from_str(&frame).unwrap());
        }
        events
    }

    fn names(events: &[serde_json::Value]) -> Vec<String> {
        events
            .iter()
            .map(|event| event["event"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_end_to_end_priority_timeout_scenario() {
        let (mut hub, clock) = hub();
        let mut viewer = hub.connect_viewer().unwrap();
        assert_eq!(names(&drain(&mut viewer)), vec!["initial-state"]);

        let report = hub.ingest_readings(vec![rssi(A, -59)], None).unwrap();
        assert_eq!(report.received, 1);
        assert_eq!(report.total_devices, 1);
        let devices = hub.devices();
        assert_eq!(devices.len(), 1);
        assert!((devices[0].distance - 1.0).abs() < 1e-9);
        assert!(!devices[0].is_priority);

        hub.set_priority(A, true).unwrap();
        assert!(hub.devices()[0].is_priority);
        let events = drain(&mut viewer);
        assert_eq!(
            names(&events),
            vec!["device-snapshot-update", "priority-update"]
        );
        assert_eq!(events[1]["data"]["is_priority"], true);

        clock.advance(TimeDelta::minutes(2) + TimeDelta::seconds(1));
        let report = hub.ingest_readings(vec![rssi(B, -70)], None).unwrap();
        assert_eq!(report.evicted, 1);

        let devices = hub.devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].address.as_str(), B);

        let log = hub.recent_notifications(10);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].address.as_str(), A);
        assert_eq!(log[0].event_type, EventType::Disconnection);
        assert_eq!(log[0].origin, NotificationOrigin::SystemTimeout);

        assert_eq!(
            names(&drain(&mut viewer)),
            vec!["notification-created", "device-snapshot-update"]
        );
    }

    #[test]
    fn test_non_priority_eviction_is_silent() {
        let (mut hub, clock) = hub();
        hub.ingest_readings(vec![rssi(A, -59)], None).unwrap();
        clock.advance(TimeDelta::minutes(3));
        let report = hub.ingest_readings(vec![rssi(B, -59)], None).unwrap();

        assert_eq!(report.evicted, 1);
        assert_eq!(hub.notification_count(), 0);
    }

    #[test]
    fn test_exactly_one_timeout_notification_per_eviction() {
        let (mut hub, clock) = hub();
        hub.set_priority(A, true).unwrap();
        hub.ingest_readings(vec![rssi(A, -59)], None).unwrap();

        clock.advance(TimeDelta::minutes(10));
        hub.ingest_readings(vec![rssi(B, -59)], None).unwrap();
        hub.ingest_readings(vec![rssi(B, -59)], None).unwrap();
        hub.sweep().unwrap();

        assert_eq!(hub.notification_count(), 1);
    }

    #[test]
    fn test_priority_before_first_sighting() {
        let (mut hub, _clock) = hub();
        let update = hub.set_priority("aa:bb:cc:dd:ee:01", true).unwrap();
        assert_eq!(update.address.as_str(), A);
        assert!(hub.devices().is_empty());

        hub.ingest_readings(vec![rssi(A, -65)], None).unwrap();
        assert!(hub.devices()[0].is_priority);
    }

    #[test]
    fn test_priority_survives_eviction() {
        let (mut hub, clock) = hub();
        hub.ingest_readings(vec![rssi(A, -65)], None).unwrap();
        hub.set_priority(A, true).unwrap();
        clock.advance(TimeDelta::minutes(6));
        hub.sweep().unwrap();

        assert!(hub.devices().is_empty());
        assert_eq!(hub.priority_addresses().len(), 1);
    }

    #[test]
    fn test_malformed_batch_changes_nothing() {
        let (mut hub, _clock) = hub();
        let mut viewer = hub.connect_viewer().unwrap();
        drain(&mut viewer);

        let err = hub
            .ingest_readings(vec![rssi(A, -59), rssi("garbage", -59)], None)
            .unwrap_err();
        assert!(err.is_validation_error());
        assert!(hub.devices().is_empty());
        assert_eq!(hub.health_status().total_submissions, 0);
        assert!(drain(&mut viewer).is_empty());
    }

    #[test]
    fn test_sweep_uses_longer_threshold() {
        let (mut hub, clock) = hub();
        hub.ingest_readings(vec![rssi(A, -59)], None).unwrap();

        clock.advance(TimeDelta::minutes(3));
        assert_eq!(hub.sweep().unwrap().evicted, 0);
        assert_eq!(hub.devices().len(), 1);

        clock.advance(TimeDelta::minutes(2) + TimeDelta::seconds(1));
        assert_eq!(hub.sweep().unwrap().evicted, 1);
    }

    #[test]
    fn test_sweep_purges_expired_notifications() {
        let (mut hub, clock) = hub();
        let mut viewer = hub.connect_viewer().unwrap();
        hub.report_notification(RawNotification {
            address: A.to_string(),
            name: Some("Keys".to_string()),
            event_type: "connection".to_string(),
            timestamp: None,
        })
        .unwrap();

        clock.advance(TimeDelta::hours(2) + TimeDelta::seconds(1));
        drain(&mut viewer);
        let report = hub.sweep().unwrap();

        assert_eq!(report.purged, 1);
        assert_eq!(hub.notification_count(), 0);
        assert_eq!(names(&drain(&mut viewer)), vec!["notifications-snapshot"]);
    }

    #[test]
    fn test_report_notification_records_notifier_contact() {
        let (mut hub, _clock) = hub();
        let stored = hub
            .report_notification(RawNotification {
                address: A.to_string(),
                name: None,
                event_type: "custom-threshold".to_string(),
                timestamp: None,
            })
            .unwrap();

        assert_eq!(stored.origin, NotificationOrigin::ProducerReported);
        assert_eq!(stored.device_name, A);
        assert!(hub.health_flags().notifier_active);
        assert!(!hub.health_flags().scanner_active);
    }

    #[test]
    fn test_clear_notifications_broadcasts() {
        let (mut hub, _clock) = hub();
        hub.report_notification(RawNotification {
            address: A.to_string(),
            name: None,
            event_type: "connection".to_string(),
            timestamp: None,
        })
        .unwrap();
        let mut viewer = hub.connect_viewer().unwrap();
        drain(&mut viewer);

        assert_eq!(hub.clear_notifications().unwrap(), 1);
        let events = drain(&mut viewer);
        assert_eq!(names(&events), vec!["notifications-cleared"]);
        assert_eq!(events[0]["data"]["cleared"], 1);
    }

    #[test]
    fn test_initial_state_contents() {
        let (mut hub, _clock) = hub();
        hub.ingest_readings(vec![rssi(A, -59)], None).unwrap();
        hub.set_priority(B, true).unwrap();
        for _ in 0..25 {
            hub.report_notification(RawNotification {
                address: B.to_string(),
                name: None,
                event_type: "connection".to_string(),
                timestamp: None,
            })
            .unwrap();
        }

        let mut viewer = hub.connect_viewer().unwrap();
        let events = drain(&mut viewer);
        assert_eq!(events.len(), 1);
        let data = &events[0]["data"];
        assert_eq!(data["devices"].as_array().unwrap().len(), 1);
        assert_eq!(data["priority_addresses"][0], B);
        assert_eq!(data["notifications"].as_array().unwrap().len(), 20);
        assert_eq!(data["health"]["scanner_active"], true);
    }

    #[test]
    fn test_reconnect_gets_no_replay() {
        let (mut hub, _clock) = hub();
        let first = hub.connect_viewer().unwrap();
        hub.disconnect_viewer(first.id);
        hub.set_priority(A, true).unwrap();

        let mut second = hub.connect_viewer().unwrap();
        let events = drain(&mut second);
        assert_eq!(names(&events), vec!["initial-state"]);
    }

    #[test]
    fn test_answer_only_reaches_requester() {
        let (mut hub, _clock) = hub();
        let mut asker = hub.connect_viewer().unwrap();
        let mut other = hub.connect_viewer().unwrap();
        drain(&mut asker);
        drain(&mut other);

        assert!(hub.answer(asker.id, ClientCommand::RequestSystemStats).unwrap());
        assert_eq!(names(&drain(&mut asker)), vec!["system-stats-update"]);
        assert!(drain(&mut other).is_empty());
    }

    #[test]
    fn test_health_alert_repeats_while_offline() {
        let (mut hub, clock) = hub();
        let mut viewer = hub.connect_viewer().unwrap();
        drain(&mut viewer);

        hub.ingest_readings(vec![], None).unwrap();
        hub.report_notification(RawNotification {
            address: A.to_string(),
            name: None,
            event_type: "connection".to_string(),
            timestamp: None,
        })
        .unwrap();
        assert!(hub.check_health().unwrap().is_none());

        clock.advance(TimeDelta::seconds(121));
        assert!(hub.check_health().unwrap().is_some());
        clock.advance(TimeDelta::seconds(60));
        assert!(hub.check_health().unwrap().is_some());

        let alerts = drain(&mut viewer)
            .into_iter()
            .filter(|event| event["event"] == "system-alert")
            .count();
        assert_eq!(alerts, 2);
    }

    #[test]
    fn test_scheduled_jobs_run_from_manual_clock() {
        let (mut hub, clock) = hub();
        hub.ingest_readings(vec![rssi(A, -59)], None).unwrap();
        hub.set_priority(A, true).unwrap();

        clock.advance(TimeDelta::minutes(5));
        let jobs = hub.take_due_jobs();
        assert!(jobs.contains(&Job::StaleSweep));

        let mut swept = None;
        for job in jobs {
            if let JobReport::Sweep(report) = hub.run_job(job).unwrap() {
                swept = Some(report);
            }
        }
        // Exactly five minutes old is not yet past the sweep threshold.
        assert_eq!(swept, Some(SweepReport::default()));

        clock.advance(TimeDelta::minutes(5));
        for job in hub.take_due_jobs() {
            hub.run_job(job).unwrap();
        }
        assert!(hub.devices().is_empty());
        assert_eq!(hub.notification_count(), 1);
    }

    #[test]
    fn test_set_priority_rejects_bad_address() {
        let (mut hub, _clock) = hub();
        assert!(matches!(
            hub.set_priority("12345", true),
            Err(ProximaError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_shutdown_closes_viewers() {
        let (mut hub, _clock) = hub();
        let mut viewer = hub.connect_viewer().unwrap();
        drain(&mut viewer);
        hub.shutdown();
        assert_eq!(hub.subscriber_count(), 0);
        assert!(viewer.receiver.try_recv().is_err());
    }

    #[test]
    fn test_no_viewers_accepted_after_shutdown() {
        let (mut hub, _clock) = hub();
        assert!(!hub.is_closed());
        hub.shutdown();
        assert!(hub.is_closed());

        assert!(matches!(
            hub.connect_viewer(),
            Err(ProximaError::ShuttingDown)
        ));
        assert_eq!(hub.subscriber_count(), 0);
    }
}
