//! Notification kind names for job lifecycle updates.
//!
//! Used by the engine when it labels notifier calls in logs and in the
//! job's own log.

use crate::job::JobStatus;

/// Progress update during job execution.
pub const EVENT_JOB_PROGRESS: &str = "job_progress";

/// Job completed successfully.
pub const EVENT_JOB_COMPLETED: &str = "job_completed";

/// Job finished with a failed result.
pub const EVENT_JOB_FAILED: &str = "job_failed";

/// Job was cancelled (by a caller, the supervisor or shutdown).
pub const EVENT_JOB_CANCELLED: &str = "job_cancelled";

/// Event name for a job that has reached `status`.
///
/// Returns `None` for the non-terminal statuses.
pub fn terminal_event(status: JobStatus) -> Option<&'static str> {
    match status {
        JobStatus::Completed => Some(EVENT_JOB_COMPLETED),
        JobStatus::Failed => Some(EVENT_JOB_FAILED),
        JobStatus::Cancelled => Some(EVENT_JOB_CANCELLED),
        JobStatus::Pending | JobStatus::Running => None,
    }
}
