//! Progress callback handed to work functions.

use std::sync::Arc;

use mvbot_core::types::JobId;
use tokio_util::sync::CancellationToken;

use crate::engine::{Notification, NotifySender, Shared};
use crate::error::WorkError;

/// Reports step progress for one job back into the engine.
///
/// Each report briefly takes the table lock, records the update, then
/// queues a progress notification without waiting for it to be delivered.
/// Every report is also a cancellation checkpoint: once the job has been
/// cancelled it returns [`WorkError::Cancelled`] and records nothing, so
/// work functions can simply propagate it with `?`.
#[derive(Clone)]
pub struct ProgressReporter {
    shared: Arc<Shared>,
    job_id: JobId,
    cancel: CancellationToken,
    notify: Option<NotifySender>,
}

impl ProgressReporter {
    pub(crate) fn new(
        shared: Arc<Shared>,
        job_id: JobId,
        cancel: CancellationToken,
        notify: Option<NotifySender>,
    ) -> Self {
        Self {
            shared,
            job_id,
            cancel,
            notify,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Record that `completed` of `total` steps are done, `step` being the
    /// current one.
    pub async fn report(&self, step: &str, completed: u32, total: u32) -> Result<(), WorkError> {
        self.report_with_message(step, completed, total, None).await
    }

    /// Like [`report`](Self::report), also appending `message` to the job log.
    pub async fn report_with_message(
        &self,
        step: &str,
        completed: u32,
        total: u32,
        message: Option<&str>,
    ) -> Result<(), WorkError> {
        if self.cancel.is_cancelled() {
            return Err(WorkError::Cancelled);
        }

        let snapshot = {
            let mut table = self.shared.table.write().await;
            let Some(job) = table.jobs.get_mut(&self.job_id) else {
                return Err(WorkError::Cancelled);
            };
            if !job.update_progress(step, completed, total, message) {
                return Err(WorkError::Cancelled);
            }
            self.shared.publish(job);
            tracing::debug!(
                job_id = %self.job_id,
                step,
                completed,
                total,
                "Job progress recorded",
            );
            self.notify.as_ref().map(|_| job.clone())
        };

        if let (Some(job), Some(tx)) = (snapshot, &self.notify) {
            let _ = tx.send(Notification::Progress(job));
        }
        Ok(())
    }

    /// Cancellation checkpoint between steps that do not report progress.
    pub fn checkpoint(&self) -> Result<(), WorkError> {
        if self.cancel.is_cancelled() {
            Err(WorkError::Cancelled)
        } else {
            Ok(())
        }
    }
}
