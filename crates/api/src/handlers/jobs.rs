//! Handlers for the `/jobs` resource.
//!
//! Thin wrappers over [`JobEngine`](mvbot_engine::JobEngine): list, start,
//! inspect, cancel and record external callbacks. Jobs that name an origin but no notification handle
//! get an initial comment posted before they start, when a GitHub client
//! is configured.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use mvbot_core::error::CoreError;
use mvbot_core::job::{validate_job_id, Job, JobKind, Origin, REF_NOTIFICATION_HANDLE};
use mvbot_engine::EngineError;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Log entries returned when `tail` is not given.
const DEFAULT_LOG_TAIL: usize = 3;

/// Reason recorded when a cancel request carries none.
const DEFAULT_CANCEL_REASON: &str = "cancelled by request";

/// Body of `POST /jobs`.
#[derive(Debug, Deserialize)]
pub struct StartJobRequest {
    /// Caller-chosen id; a UUID is generated when absent.
    pub id: Option<String>,
    pub kind: JobKind,
    #[serde(default)]
    pub config: serde_json::Value,
    pub origin: Option<Origin>,
    #[serde(default)]
    pub external_refs: BTreeMap<String, String>,
}

/// Body of `POST /jobs/{id}/cancel`.
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub tail: Option<usize>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn job_not_found(id: &str) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Job",
        id: id.to_string(),
    })
}

impl StartJobRequest {
    fn into_job(self) -> AppResult<Job> {
        let config = if self.config.is_null() {
            serde_json::json!({})
        } else {
            self.config
        };
        let mut job = Job::new(self.kind, config);
        if let Some(id) = self.id {
            validate_job_id(&id)?;
            job = job.with_id(id);
        }
        if let Some(origin) = self.origin {
            job = job.with_origin(origin);
        }
        job.external_refs.extend(self.external_refs);
        Ok(job)
    }
}

/// Post the "command accepted" comment and record its id as the job's
/// notification handle. Failure is logged and the job starts without one.
///
/// Returns the id of the comment posted here, if any.
async fn attach_notification_handle(state: &AppState, job: Job) -> (Job, Option<u64>) {
    let (Some(github), Some(origin)) = (&state.github, &job.origin) else {
        return (job, None);
    };
    if job.notification_handle().is_some() {
        return (job, None);
    }

    let body = mvbot_github::format::accepted_message(&job);
    match github
        .create_comment(&origin.repository, origin.thread_number, &body)
        .await
    {
        Ok(comment) => (
            job.with_external_ref(REF_NOTIFICATION_HANDLE, comment.id.to_string()),
            Some(comment.id),
        ),
        Err(e) => {
            tracing::warn!(
                job_id = %job.id,
                repo = %origin.repository,
                error = %e,
                "Failed to create initial comment, starting job without notification handle",
            );
            (job, None)
        }
    }
}

/// Attach a notification handle and start `job`, returning its snapshot.
///
/// Another start of the same id can win while the accepted comment is in
/// flight. The engine then refuses this one and the comment posted here is
/// rewritten to say the command did not start.
pub async fn start_prepared(state: &AppState, job: Job) -> AppResult<Job> {
    let (job, posted) = attach_notification_handle(state, job).await;
    let id = job.id.clone();
    let kind = job.kind;

    if let Err(e) = state.engine.start(job.clone()).await {
        if let (EngineError::DuplicateJob(_), Some(comment_id)) = (&e, posted) {
            retract_accepted_comment(state, &job, comment_id).await;
        }
        return Err(e.into());
    }

    let snapshot = state
        .engine
        .get_job(&id)
        .await
        .ok_or_else(|| AppError::InternalError(format!("job {id} vanished after start")))?;

    tracing::info!(job_id = %id, kind = %kind, "Job accepted");
    Ok(snapshot)
}

async fn retract_accepted_comment(state: &AppState, job: &Job, comment_id: u64) {
    tracing::warn!(
        job_id = %job.id,
        comment_id,
        "Job id taken after accepted comment was posted",
    );
    let (Some(github), Some(origin)) = (&state.github, &job.origin) else {
        return;
    };
    let body = mvbot_github::format::duplicate_message(job);
    if let Err(e) = github
        .update_comment(&origin.repository, comment_id, &body)
        .await
    {
        tracing::warn!(job_id = %job.id, comment_id, error = %e, "Failed to update orphaned comment");
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Summaries of every job, in the order they were started.
pub async fn list_jobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: state.engine.summaries().await,
    }))
}

/// GET /api/v1/jobs/active
pub async fn list_active_jobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: state.engine.active_summaries().await,
    }))
}

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Start a job. Returns 201 with the job snapshot taken right after start,
/// 409 if the id is taken and 422 if no work function handles the kind.
pub async fn start_job(
    State(state): State<AppState>,
    Json(input): Json<StartJobRequest>,
) -> AppResult<impl IntoResponse> {
    let job = input.into_job()?;

    // Refuse before any comment is posted; `start` re-checks both.
    if !state.engine.supports(job.kind) {
        return Err(EngineError::UnregisteredKind(job.kind).into());
    }
    if state.engine.get_job(&job.id).await.is_some() {
        return Err(EngineError::DuplicateJob(job.id).into());
    }

    let snapshot = start_prepared(&state, job).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: snapshot })))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .engine
        .get_job(&id)
        .await
        .ok_or_else(|| job_not_found(&id))?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /api/v1/jobs/{id}/logs?tail=N
///
/// The last `tail` log entries (default 3).
pub async fn get_job_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogQuery>,
) -> AppResult<impl IntoResponse> {
    let entries = state
        .engine
        .log_tail(&id, query.tail.unwrap_or(DEFAULT_LOG_TAIL))
        .await
        .ok_or_else(|| job_not_found(&id))?;
    Ok(Json(DataResponse { data: entries }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Accepts an optional `{ "reason": "..." }` body. Returns 204 for any
/// known job, including one that is already terminal, and 404 otherwise.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let request: CancelRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CancelRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid cancel request: {e}")))?
    };
    let reason = request
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());

    if !state.engine.cancel(&id, &reason).await {
        return Err(job_not_found(&id));
    }

    tracing::info!(job_id = %id, reason = %reason, "Job cancel requested");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Callback
// ---------------------------------------------------------------------------

/// Log line recorded for an external callback payload.
fn callback_message(payload: &serde_json::Value) -> String {
    let field = |name: &str| payload.get(name).and_then(|v| v.as_str());
    let detail = match field("status") {
        Some("completed") => field("message").unwrap_or("Job completed").to_string(),
        Some("failed") => field("error").unwrap_or("Job failed").to_string(),
        _ => payload.to_string(),
    };
    format!("External callback received: {detail}")
}

/// POST /api/v1/jobs/{id}/callback
///
/// Records an externally reported event in the job log. The job's status
/// is left unchanged.
pub async fn job_callback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<impl IntoResponse> {
    let message = callback_message(&payload);
    if !state.engine.append_log(&id, message).await {
        return Err(job_not_found(&id));
    }

    tracing::info!(job_id = %id, "External callback recorded");
    Ok(Json(DataResponse {
        data: serde_json::json!({ "job_id": id, "status": "received" }),
    }))
}
