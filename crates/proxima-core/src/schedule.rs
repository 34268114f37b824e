//! Periodic maintenance jobs.
//!
//! The schedule only decides *which* jobs are due at a given instant; it
//! never sleeps. The server polls [`Schedule::take_due`] from a short tokio
//! interval, while tests call it after moving a [`ManualClock`].
//!
//! [`ManualClock`]: crate::clock::ManualClock

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::{secs, Config};

/// A recurring maintenance task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    /// Evict devices past the sweep threshold and purge expired notifications.
    StaleSweep,
    /// Evaluate producer health and alert if any is offline.
    HealthCheck,
    /// Push aggregate stats to viewers.
    StatsBroadcast,
}

impl Job {
    /// Name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StaleSweep => "stale_sweep",
            Self::HealthCheck => "health_check",
            Self::StatsBroadcast => "stats_broadcast",
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    job: Job,
    period: TimeDelta,
    next_due: DateTime<Utc>,
}

/// Due-time bookkeeping for every periodic job.
#[derive(Debug, Clone)]
pub struct Schedule {
    entries: Vec<Entry>,
}

impl Schedule {
    /// Build the schedule from configuration. Each job first runs one
    /// period after `start`. Jobs with a zero period are left out.
    #[must_use]
    pub fn from_config(config: &Config, start: DateTime<Utc>) -> Self {
        let mut schedule = Self {
            entries: Vec::new(),
        };
        schedule.add(Job::StaleSweep, secs(config.eviction.sweep_interval_secs), start);
        schedule.add(Job::HealthCheck, secs(config.health.check_interval_secs), start);
        schedule.add(
            Job::StatsBroadcast,
            secs(config.broadcast.stats_interval_secs),
            start,
        );
        schedule
    }

    fn add(&mut self, job: Job, period: TimeDelta, start: DateTime<Utc>) {
        if period <= TimeDelta::zero() {
            return;
        }
        self.entries.push(Entry {
            job,
            period,
            next_due: start.checked_add_signed(period).unwrap_or(DateTime::<Utc>::MAX_UTC),
        });
    }

    /// Jobs whose due time is at or before `now`.
    ///
    /// A job that missed several periods is returned once and re-anchored
    /// to the first due time after `now`.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<Job> {
        let mut due = Vec::new();
        for entry in &mut self.entries {
            if entry.next_due > now {
                continue;
            }
            due.push(entry.job);
            while entry.next_due <= now {
                match entry.next_due.checked_add_signed(entry.period) {
                    Some(next) => entry.next_due = next,
                    None => {
                        entry.next_due = DateTime::<Utc>::MAX_UTC;
                        break;
                    }
                }
            }
        }
        due
    }

    /// Next due time of `job`, if scheduled.
    #[must_use]
    pub fn next_due(&self, job: Job) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .find(|entry| entry.job == job)
            .map(|entry| entry.next_due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_nothing_due_at_start() {
        let mut schedule = Schedule::from_config(&Config::default(), t0());
        assert!(schedule.take_due(t0()).is_empty());
    }

    #[test]
    fn test_jobs_fire_on_their_periods() {
        let mut schedule = Schedule::from_config(&Config::default(), t0());

        assert_eq!(
            schedule.take_due(t0() + TimeDelta::seconds(30)),
            vec![Job::StatsBroadcast]
        );
        assert_eq!(
            schedule.take_due(t0() + TimeDelta::seconds(60)),
            vec![Job::HealthCheck, Job::StatsBroadcast]
        );
        assert!(schedule.take_due(t0() + TimeDelta::seconds(61)).is_empty());

        let due = schedule.take_due(t0() + TimeDelta::minutes(5));
        assert!(due.contains(&Job::StaleSweep));
        assert!(due.contains(&Job::HealthCheck));
    }

    #[test]
    fn test_missed_periods_fire_once() {
        let mut schedule = Schedule::from_config(&Config::default(), t0());
        let late = t0() + TimeDelta::minutes(17);

        let due = schedule.take_due(late);
        assert_eq!(due.iter().filter(|job| **job == Job::HealthCheck).count(), 1);
        assert_eq!(
            schedule.next_due(Job::HealthCheck),
            Some(t0() + TimeDelta::minutes(18))
        );
        assert_eq!(
            schedule.next_due(Job::StaleSweep),
            Some(t0() + TimeDelta::minutes(20))
        );
    }

    #[test]
    fn test_zero_period_disables_job() {
        let mut config = Config::default();
        config.broadcast.stats_interval_secs = 0;
        let mut schedule = Schedule::from_config(&config, t0());

        assert!(schedule.next_due(Job::StatsBroadcast).is_none());
        assert!(!schedule
            .take_due(t0() + TimeDelta::hours(1))
            .contains(&Job::StatsBroadcast));
    }
}
