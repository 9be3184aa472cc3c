pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                      list, start
/// /jobs/active               active jobs
/// /jobs/{id}                 single job
/// /jobs/{id}/logs            log tail
/// /jobs/{id}/cancel          cancel
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router())
}
