//! [`Notifier`] implementation that edits the job's origin comment.

use std::sync::Arc;

use async_trait::async_trait;
use mvbot_core::job::{Job, Origin};
use mvbot_engine::{Notifier, NotifyError};

use crate::client::GitHubClient;
use crate::format;

/// Rewrites the comment named by the job's notification handle on every
/// update.
#[derive(Debug, Clone)]
pub struct CommentNotifier {
    client: Arc<GitHubClient>,
}

impl CommentNotifier {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }

    async fn update(&self, job: &Job, body: String) -> Result<(), NotifyError> {
        let (origin, comment_id) = target(job)?;
        self.client
            .update_comment(&origin.repository, comment_id, &body)
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}

/// Resolve the repository and comment id an update for `job` goes to.
pub fn target(job: &Job) -> Result<(&Origin, u64), NotifyError> {
    let origin = job
        .origin
        .as_ref()
        .ok_or_else(|| NotifyError::MissingTarget(format!("job {} has no origin", job.id)))?;
    let handle = job.notification_handle().ok_or_else(|| {
        NotifyError::MissingTarget(format!("job {} has no notification handle", job.id))
    })?;
    let comment_id = handle.parse::<u64>().map_err(|_| {
        NotifyError::MissingTarget(format!("invalid comment id {handle:?} for job {}", job.id))
    })?;
    Ok((origin, comment_id))
}

#[async_trait]
impl Notifier for CommentNotifier {
    async fn on_progress(&self, job: &Job) -> Result<(), NotifyError> {
        self.update(job, format::progress_message(job, chrono::Utc::now()))
            .await
    }

    async fn on_final(&self, job: &Job) -> Result<(), NotifyError> {
        self.update(job, format::final_message(job, chrono::Utc::now()))
            .await
    }
}
