use mvbot_core::job::{JobKind, JobStatus};
use mvbot_core::types::JobId;

/// Synchronous failures reported by [`JobEngine`](crate::JobEngine) and
/// [`WorkRegistry`](crate::WorkRegistry). None of these leave a job in the
/// table.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Job {0} already exists")]
    DuplicateJob(JobId),

    #[error("No work function registered for job kind {0}")]
    UnregisteredKind(JobKind),

    #[error("Job {id} is {status}, only pending jobs can be started")]
    NotPending { id: JobId, status: JobStatus },

    #[error("A work function is already registered for job kind {0}")]
    DuplicateRegistration(JobKind),

    #[error("Engine is shutting down")]
    ShuttingDown,
}

/// How a work function ended without producing a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkError {
    /// Cancellation was observed at a suspension point.
    #[error("Job execution cancelled")]
    Cancelled,

    /// Unexpected failure; the message becomes `result.error_message`.
    #[error("{0}")]
    Failed(String),
}

impl WorkError {
    pub fn failed(message: impl Into<String>) -> Self {
        WorkError::Failed(message.into())
    }
}
