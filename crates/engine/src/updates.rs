//! Live job updates for streaming subscribers.
//!
//! The engine publishes a [`JobUpdate`] on a `tokio::sync::broadcast`
//! channel after every recorded change. Subscribers that fall behind lose
//! the oldest updates and should re-read the job snapshot.

use mvbot_core::job::{Job, JobProgress, JobStatus};
use mvbot_core::job_events::{terminal_event, EVENT_JOB_PROGRESS};
use mvbot_core::types::JobId;
use serde::Serialize;

/// Updates buffered per subscriber before the oldest are dropped.
pub const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// One change to a job, as seen by stream subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobUpdate {
    pub id: JobId,
    /// One of the `EVENT_JOB_*` names.
    pub event: &'static str,
    pub status: JobStatus,
    pub progress: Option<JobProgress>,
    /// Latest log line at the time of the update.
    pub message: Option<String>,
}

impl JobUpdate {
    /// Snapshot of `job`, labelled by its status.
    pub fn from_job(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            event: terminal_event(job.status).unwrap_or(EVENT_JOB_PROGRESS),
            status: job.status,
            progress: job.progress.clone(),
            message: job.log.last().map(|entry| entry.message.clone()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
