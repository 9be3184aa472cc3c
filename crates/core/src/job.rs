//! Job record and lifecycle state machine.
//!
//! A [`Job`] is created by the command dispatcher in the `Pending` state
//! and handed to the engine, which from then on is the only writer of
//! `status`, `progress`, `result`, the timestamps, and the log. Every
//! transition method checks [`JobStatus::can_transition_to`] first and is
//! a no-op returning `false` when the move is not allowed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// `external_refs` key under which the notifier adapter stores the handle
/// of the remote status message it keeps updating.
pub const REF_NOTIFICATION_HANDLE: &str = "notification_handle";

/// Maximum length of a caller-supplied job id.
const MAX_JOB_ID_LEN: usize = 128;

// ---------------------------------------------------------------------------
// JobKind
// ---------------------------------------------------------------------------

/// Selects which registered work function runs for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Train,
    Eval,
    Test,
    Pipeline,
    ModelValidation,
}

impl JobKind {
    /// Every kind, in declaration order.
    pub const ALL: [JobKind; 5] = [
        JobKind::Train,
        JobKind::Eval,
        JobKind::Test,
        JobKind::Pipeline,
        JobKind::ModelValidation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Train => "train",
            JobKind::Eval => "eval",
            JobKind::Test => "test",
            JobKind::Pipeline => "pipeline",
            JobKind::ModelValidation => "model_validation",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown job kind: \"{s}\"")))
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a job.
///
/// ```text
/// Pending ──► Running ──► Completed | Failed | Cancelled
///    └──────────────────► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Completed, Failed and Cancelled have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Pending or Running.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Snapshot of how far a running job has got.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub current_step: String,
    pub completed_steps: u32,
    pub total_steps: u32,
    /// Always finite and within `0.0..=100.0`.
    pub percentage: f64,
    /// Estimated seconds remaining. `None` until at least one step is done.
    pub eta_secs: Option<u64>,
}

impl JobProgress {
    pub fn new(current_step: impl Into<String>, completed_steps: u32, total_steps: u32) -> Self {
        Self {
            current_step: current_step.into(),
            completed_steps,
            total_steps,
            percentage: progress_percentage(completed_steps, total_steps),
            eta_secs: None,
        }
    }
}

/// `completed / total * 100`, clamped to `0..=100`. A zero total yields 0.
pub fn progress_percentage(completed: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (f64::from(completed) / f64::from(total) * 100.0).clamp(0.0, 100.0)
}

/// Linear estimate of the seconds left, given how long the completed steps
/// took.
pub fn estimate_eta_secs(elapsed_secs: u64, completed: u32, total: u32) -> Option<u64> {
    if completed == 0 || total == 0 {
        return None;
    }
    if completed >= total {
        return Some(0);
    }
    let remaining = u64::from(total - completed);
    Some(elapsed_secs.saturating_mul(remaining) / u64::from(completed))
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Outcome of a finished work function. Present on a job only once it is
/// Completed or Failed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobResult {
    pub success: bool,
    #[serde(default)]
    pub output: serde_json::Map<String, serde_json::Value>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl JobResult {
    pub fn success() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(error_message.into()),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.output.insert(key.into(), value.into());
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifacts.push(artifact.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Origin / log
// ---------------------------------------------------------------------------

/// External conversation a job's notifications are addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// Collaboration platform, e.g. `"github"`.
    pub platform: String,
    /// `owner/name` of the repository the command was issued in.
    pub repository: String,
    /// Issue or pull request number.
    pub thread_number: u64,
    /// Login of the user who issued the command.
    pub user: Option<String>,
}

/// One timestamped line of a job's append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: Timestamp,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.to_rfc3339(), self.message)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One tracked unit of requested work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Caller payload, passed verbatim to the work function.
    pub config: serde_json::Value,
    pub origin: Option<Origin>,
    pub progress: Option<JobProgress>,
    pub result: Option<JobResult>,
    pub external_refs: BTreeMap<String, String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub log: Vec<LogEntry>,
}

impl Job {
    /// Create a `Pending` job with a fresh UUID v4 id.
    pub fn new(kind: JobKind, config: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            status: JobStatus::Pending,
            config,
            origin: None,
            progress: None,
            result: None,
            external_refs: BTreeMap::new(),
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            log: Vec::new(),
        }
    }

    /// Replace the generated id with an externally supplied one.
    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_external_ref(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.external_refs.insert(key.into(), value.into());
        self
    }

    /// Handle of the remote status message, if the dispatcher created one.
    pub fn notification_handle(&self) -> Option<&str> {
        self.external_refs
            .get(REF_NOTIFICATION_HANDLE)
            .map(String::as_str)
    }

    /// Append a timestamped log line.
    pub fn add_log(&mut self, message: impl Into<String>) {
        self.log.push(LogEntry {
            at: chrono::Utc::now(),
            message: message.into(),
        });
    }

    /// The last `n` log entries, oldest first.
    pub fn log_tail(&self, n: usize) -> &[LogEntry] {
        let start = self.log.len().saturating_sub(n);
        &self.log[start..]
    }

    /// Pending -> Running. Sets `started_at`.
    pub fn mark_started(&mut self) -> bool {
        if !self.status.can_transition_to(JobStatus::Running) {
            return false;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(chrono::Utc::now());
        self.add_log("Job started");
        true
    }

    /// Running -> Completed when `result.success`, otherwise Running -> Failed.
    pub fn mark_completed(&mut self, result: JobResult) -> bool {
        let next = if result.success {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.completed_at = Some(chrono::Utc::now());
        self.result = Some(result);
        self.add_log(format!("Job completed with status: {next}"));
        true
    }

    /// Pending|Running -> Cancelled. No result is recorded.
    pub fn mark_cancelled(&mut self, reason: &str) -> bool {
        if !self.status.can_transition_to(JobStatus::Cancelled) {
            return false;
        }
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(chrono::Utc::now());
        if reason.is_empty() {
            self.add_log("Job cancelled");
        } else {
            self.add_log(format!("Job cancelled: {reason}"));
        }
        true
    }

    /// Record a progress update while Running.
    ///
    /// `completed_steps` never decreases: a report lower than the previous
    /// one keeps the previous count. The optional `message` is appended to
    /// the log.
    pub fn update_progress(
        &mut self,
        step: &str,
        completed: u32,
        total: u32,
        message: Option<&str>,
    ) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        let completed = self
            .progress
            .as_ref()
            .map_or(completed, |prev| completed.max(prev.completed_steps));

        let mut progress = JobProgress::new(step, completed, total);
        if let Some(started_at) = self.started_at {
            let elapsed = (chrono::Utc::now() - started_at).num_seconds().max(0) as u64;
            progress.eta_secs = estimate_eta_secs(elapsed, completed, total);
        }
        self.progress = Some(progress);

        if let Some(message) = message.filter(|m| !m.is_empty()) {
            self.add_log(message);
        }
        true
    }

    /// Wall-clock time spent Running (or until now, if still running).
    pub fn running_for(&self, now: Timestamp) -> Option<chrono::Duration> {
        let started_at = self.started_at?;
        let end = self.completed_at.unwrap_or(now);
        Some(end - started_at)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate an externally supplied job id.
///
/// Rules:
/// - Must not be empty.
/// - Must not exceed `MAX_JOB_ID_LEN` characters.
/// - Only alphanumeric, hyphen, underscore, or dot characters.
pub fn validate_job_id(id: &str) -> Result<(), CoreError> {
    if id.is_empty() {
        return Err(CoreError::Validation("Job id must not be empty".to_string()));
    }
    if id.len() > MAX_JOB_ID_LEN {
        return Err(CoreError::Validation(format!(
            "Job id must not exceed {MAX_JOB_ID_LEN} characters"
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(CoreError::Validation(
            "Job id may only contain alphanumeric, hyphen, underscore, or dot characters"
                .to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn running_job() -> Job {
        let mut job = Job::new(JobKind::Train, serde_json::json!({}));
        assert!(job.mark_started());
        job
    }

    // -- state machine --------------------------------------------------------

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        use JobStatus::*;
        for from in [Completed, Failed, Cancelled] {
            for to in [Pending, Running, Completed, Failed, Cancelled] {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn pending_cannot_complete_directly() {
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Cancelled));
    }

    #[test]
    fn mark_started_sets_started_at_once() {
        let mut job = Job::new(JobKind::Eval, serde_json::json!({}));
        assert!(job.started_at.is_none());
        assert!(job.mark_started());
        let first = job.started_at;
        assert!(first.is_some());
        assert!(!job.mark_started());
        assert_eq!(job.started_at, first);
        assert_eq!(job.status, JobStatus::Running);
    }

    #[test]
    fn failed_result_moves_to_failed() {
        let mut job = running_job();
        assert!(job.mark_completed(JobResult::failure("boom")));
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.completed_at.is_some());
        assert_eq!(
            job.result.as_ref().and_then(|r| r.error_message.as_deref()),
            Some("boom")
        );
    }

    #[test]
    fn cancel_does_not_overwrite_completed() {
        let mut job = running_job();
        assert!(job.mark_completed(JobResult::success()));
        let completed_at = job.completed_at;

        assert!(!job.mark_cancelled("too late"));
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_at, completed_at);
        assert!(job.result.is_some());
    }

    #[test]
    fn cancel_records_reason_and_no_result() {
        let mut job = running_job();
        assert!(job.mark_cancelled("user requested"));
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.result.is_none());
        assert!(job.log.iter().any(|e| e.message.contains("user requested")));
    }

    #[test]
    fn pending_job_can_be_cancelled() {
        let mut job = Job::new(JobKind::Test, serde_json::json!({}));
        assert!(job.mark_cancelled(""));
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.started_at.is_none());
        assert_eq!(job.log.last().map(|e| e.message.as_str()), Some("Job cancelled"));
    }

    // -- progress -------------------------------------------------------------

    #[test]
    fn percentage_with_zero_total_is_zero() {
        assert_eq!(progress_percentage(0, 0), 0.0);
        assert_eq!(progress_percentage(5, 0), 0.0);
    }

    #[test]
    fn percentage_is_clamped() {
        assert_eq!(progress_percentage(7, 5), 100.0);
        assert!((progress_percentage(1, 3) - 33.333).abs() < 0.01);
    }

    #[test]
    fn eta_needs_a_completed_step() {
        assert_eq!(estimate_eta_secs(10, 0, 4), None);
        assert_eq!(estimate_eta_secs(10, 1, 4), Some(30));
        assert_eq!(estimate_eta_secs(10, 4, 4), Some(0));
    }

    #[test]
    fn progress_is_monotonic() {
        let mut job = running_job();
        assert!(job.update_progress("b", 2, 4, None));
        assert!(job.update_progress("a", 1, 4, None));
        let progress = job.progress.as_ref().unwrap();
        assert_eq!(progress.completed_steps, 2);
        assert_eq!(progress.current_step, "a");
        assert_eq!(progress.percentage, 50.0);
    }

    #[test]
    fn progress_ignored_unless_running() {
        let mut pending = Job::new(JobKind::Train, serde_json::json!({}));
        assert!(!pending.update_progress("x", 1, 2, None));
        assert!(pending.progress.is_none());

        let mut done = running_job();
        done.mark_completed(JobResult::success());
        assert!(!done.update_progress("x", 1, 2, None));
    }

    #[test]
    fn progress_message_is_logged() {
        let mut job = running_job();
        let before = job.log.len();
        job.update_progress("Training", 1, 5, Some("Executing Training"));
        job.update_progress("Training", 2, 5, Some(""));
        assert_eq!(job.log.len(), before + 1);
        assert_eq!(job.log_tail(1)[0].message, "Executing Training");
    }

    // -- misc -----------------------------------------------------------------

    #[test]
    fn log_tail_shorter_than_requested() {
        let mut job = Job::new(JobKind::Train, serde_json::json!({}));
        job.add_log("one");
        job.add_log("two");
        assert_eq!(job.log_tail(3).len(), 2);
        assert_eq!(job.log_tail(1)[0].message, "two");
        assert!(job.log_tail(0).is_empty());
    }

    #[test]
    fn kind_parses_from_wire_name() {
        assert_eq!("model_validation".parse::<JobKind>().unwrap(), JobKind::ModelValidation);
        assert!("deploy".parse::<JobKind>().is_err());
    }

    #[test]
    fn notification_handle_reads_external_ref() {
        let job = Job::new(JobKind::Train, serde_json::json!({}))
            .with_external_ref(REF_NOTIFICATION_HANDLE, "12345");
        assert_eq!(job.notification_handle(), Some("12345"));
    }

    #[test]
    fn job_id_validation() {
        assert!(validate_job_id("job-1.a_b").is_ok());
        assert!(validate_job_id("").is_err());
        assert!(validate_job_id("has space").is_err());
        assert!(validate_job_id(&"x".repeat(129)).is_err());
    }
}
