//! Outbound notification port.
//!
//! The engine calls [`Notifier::on_progress`] after every recorded progress
//! update and [`Notifier::on_final`] once a job reaches Completed or Failed.
//! Calls for one job are delivered in order by a dedicated forwarding task,
//! so a slow remote never holds the job table lock. Errors are logged and
//! appended to the job log; they never change job status.

use async_trait::async_trait;
use mvbot_core::job::Job;

/// Errors a notifier adapter may report back to the engine.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The job lacks a reference the adapter needs to address the update.
    #[error("Missing notification target: {0}")]
    MissingTarget(String),

    /// The remote call itself failed.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Receiver of job progress and completion updates.
///
/// Only invoked for jobs that carry an [`Origin`](mvbot_core::job::Origin).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A progress update was recorded. `job` is a snapshot taken right after.
    async fn on_progress(&self, job: &Job) -> Result<(), NotifyError>;

    /// The job reached Completed or Failed and carries its result.
    async fn on_final(&self, job: &Job) -> Result<(), NotifyError>;
}

/// Notifier that only writes to the process log.
///
/// Used when no remote notification target is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn on_progress(&self, job: &Job) -> Result<(), NotifyError> {
        tracing::info!(
            job_id = %job.id,
            percentage = job.progress.as_ref().map_or(0.0, |p| p.percentage),
            "Job progress updated",
        );
        Ok(())
    }

    async fn on_final(&self, job: &Job) -> Result<(), NotifyError> {
        tracing::info!(
            job_id = %job.id,
            status = %job.status,
            success = job.result.as_ref().is_some_and(|r| r.success),
            "Job finished",
        );
        Ok(())
    }
}
