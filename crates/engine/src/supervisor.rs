//! Running-time supervisor.
//!
//! Periodically cancels jobs that have been Running longer than the
//! configured budget. Built purely on the engine's public API
//! ([`JobEngine::active_jobs`] and [`JobEngine::cancel`]).

use std::time::Duration;

use mvbot_core::job::{Job, JobStatus};
use mvbot_core::types::{JobId, Timestamp};
use tokio_util::sync::CancellationToken;

use crate::engine::JobEngine;

/// Timeout policy applied by [`run`].
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    /// Maximum time a job may stay Running.
    pub max_running: Duration,
    /// How often the supervisor checks.
    pub check_interval: Duration,
}

/// Ids of Running jobs whose running time exceeds `max_running` at `now`.
pub fn overdue_jobs(jobs: &[Job], now: Timestamp, max_running: Duration) -> Vec<JobId> {
    let Ok(budget) = chrono::Duration::from_std(max_running) else {
        return Vec::new();
    };
    jobs.iter()
        .filter(|job| job.status == JobStatus::Running)
        .filter(|job| job.running_for(now).is_some_and(|elapsed| elapsed > budget))
        .map(|job| job.id.clone())
        .collect()
}

/// Cancel every overdue job once. Returns how many were cancelled.
pub async fn sweep(engine: &JobEngine, max_running: Duration) -> usize {
    let active = engine.active_jobs().await;
    let overdue = overdue_jobs(&active, chrono::Utc::now(), max_running);
    let reason = format!("timed out after {}s", max_running.as_secs());

    for id in &overdue {
        tracing::warn!(job_id = %id, max_running_secs = max_running.as_secs(), "Job exceeded running time budget");
        engine.cancel(id, &reason).await;
    }
    overdue.len()
}

/// Run the supervisor loop until `cancel` is triggered.
pub async fn run(engine: JobEngine, policy: TimeoutPolicy, cancel: CancellationToken) {
    tracing::info!(
        max_running_secs = policy.max_running.as_secs(),
        interval_secs = policy.check_interval.as_secs(),
        "Job timeout supervisor started",
    );

    let mut interval = tokio::time::interval(policy.check_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job timeout supervisor stopping");
                break;
            }
            _ = interval.tick() => {
                let cancelled = sweep(&engine, policy.max_running).await;
                if cancelled > 0 {
                    tracing::info!(cancelled, "Timeout supervisor: cancelled overdue jobs");
                } else {
                    tracing::debug!("Timeout supervisor: no overdue jobs");
                }
            }
        }
    }
}
