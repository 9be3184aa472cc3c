//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{jobs, stream};
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// POST   /                -> start_job
/// GET    /active          -> list_active_jobs
/// GET    /{id}            -> get_job
/// GET    /{id}/logs       -> get_job_logs
/// POST   /{id}/cancel     -> cancel_job
/// POST   /{id}/callback   -> job_callback
/// GET    /{id}/stream     -> stream_job (SSE)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::start_job))
        .route("/active", get(jobs::list_active_jobs))
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/logs", get(jobs::get_job_logs))
        .route("/{id}/cancel", post(jobs::cancel_job))
        .route("/{id}/callback", post(jobs::job_callback))
        .route("/{id}/stream", get(stream::stream_job))
}
