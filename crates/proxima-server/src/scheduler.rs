//! Periodic maintenance loop.
//!
//! A one-second ticker asks the hub which [`Job`]s are due. Each due job
//! runs in its own task, so an error or a panic in one job is logged and
//! only costs that tick; the loop and the other jobs carry on.

use std::time::Duration;

use proxima_core::{Job, JobReport};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::state::SharedState;

const TICK: Duration = Duration::from_secs(1);

/// Start the maintenance loop. It runs until `shutdown` flips to `true` or
/// its sender is dropped.
pub fn spawn(state: SharedState, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    run_due_jobs(&state).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Maintenance loop stopping");
                        break;
                    }
                }
            }
        }
    })
}

/// Run every job that is due now. Returns how many completed successfully.
pub async fn run_due_jobs(state: &SharedState) -> usize {
    let jobs = state.write().await.take_due_jobs();
    let mut completed = 0;

    for job in jobs {
        let task_state = state.clone();
        let handle = tokio::spawn(async move {
            let mut hub = task_state.write().await;
            hub.run_job(job)
        });

        match handle.await {
            Ok(Ok(report)) => {
                log_report(job, &report);
                completed += 1;
            }
            Ok(Err(err)) => {
                tracing::error!(job = job.name(), error = %err, "Maintenance job failed");
            }
            Err(err) => {
                tracing::error!(job = job.name(), error = %err, "Maintenance job panicked");
            }
        }
    }

    completed
}

fn log_report(job: Job, report: &JobReport) {
    match report {
        JobReport::Sweep(sweep) => tracing::debug!(
            job = job.name(),
            evicted = sweep.evicted,
            purged = sweep.purged,
            "Stale sweep finished"
        ),
        JobReport::Health(alert) => tracing::debug!(
            job = job.name(),
            alert = alert.is_some(),
            "Health check finished"
        ),
        JobReport::Stats(viewers) => tracing::trace!(
            job = job.name(),
            viewers,
            "Stats broadcast"
        ),
    }
}
