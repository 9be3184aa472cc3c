//! Read-only projections over the job table for display layers.

use mvbot_core::job::{Job, JobKind, JobStatus};
use mvbot_core::types::{JobId, Timestamp};
use serde::Serialize;

use crate::engine::JobEngine;

/// Compact view of a job for list and status displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub current_step: Option<String>,
    pub percentage: f64,
    pub success: Option<bool>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    /// Seconds spent running so far, or in total once terminal.
    pub duration_secs: Option<i64>,
}

impl JobSummary {
    pub fn from_job(job: &Job, now: Timestamp) -> Self {
        Self {
            id: job.id.clone(),
            kind: job.kind,
            status: job.status,
            current_step: job.progress.as_ref().map(|p| p.current_step.clone()),
            percentage: job.progress.as_ref().map_or(0.0, |p| p.percentage),
            success: job.result.as_ref().map(|r| r.success),
            error_message: job.result.as_ref().and_then(|r| r.error_message.clone()),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            duration_secs: job.running_for(now).map(|d| d.num_seconds()),
        }
    }
}

impl JobEngine {
    /// Summaries of every job, in insertion order.
    pub async fn summaries(&self) -> Vec<JobSummary> {
        let now = chrono::Utc::now();
        self.shared
            .table
            .read()
            .await
            .jobs
            .values()
            .map(|job| JobSummary::from_job(job, now))
            .collect()
    }

    /// Summaries of Pending and Running jobs only.
    pub async fn active_summaries(&self) -> Vec<JobSummary> {
        let now = chrono::Utc::now();
        self.shared
            .table
            .read()
            .await
            .jobs
            .values()
            .filter(|job| job.status.is_active())
            .map(|job| JobSummary::from_job(job, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvbot_core::job::JobResult;

    #[test]
    fn summary_of_failed_job_carries_error() {
        let mut job = Job::new(JobKind::Eval, serde_json::json!({}));
        job.mark_started();
        job.update_progress("Computing metrics", 3, 4, None);
        job.mark_completed(JobResult::failure("metrics backend unreachable"));

        let summary = JobSummary::from_job(&job, chrono::Utc::now());
        assert_eq!(summary.status, JobStatus::Failed);
        assert_eq!(summary.success, Some(false));
        assert_eq!(summary.error_message.as_deref(), Some("metrics backend unreachable"));
        assert_eq!(summary.current_step.as_deref(), Some("Computing metrics"));
        assert_eq!(summary.percentage, 75.0);
        assert!(summary.duration_secs.is_some());
    }

    #[test]
    fn summary_of_pending_job_has_no_duration() {
        let job = Job::new(JobKind::Train, serde_json::json!({}));
        let summary = JobSummary::from_job(&job, chrono::Utc::now());
        assert_eq!(summary.percentage, 0.0);
        assert!(summary.duration_secs.is_none());
        assert!(summary.success.is_none());
    }
}
