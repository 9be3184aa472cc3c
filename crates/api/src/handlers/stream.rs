//! Server-sent event stream of a single job's updates.

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream;
use mvbot_engine::{JobEngine, JobUpdate};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::AppResult;
use crate::handlers::jobs::job_not_found;
use crate::state::AppState;

struct Subscription {
    engine: JobEngine,
    id: String,
    updates: broadcast::Receiver<JobUpdate>,
    pending: Option<JobUpdate>,
    finished: bool,
}

impl Subscription {
    async fn next_update(&mut self) -> Option<JobUpdate> {
        if let Some(update) = self.pending.take() {
            return Some(update);
        }
        loop {
            match self.updates.recv().await {
                Ok(update) if update.id == self.id => return Some(update),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(job_id = %self.id, skipped, "Stream lagged, resending snapshot");
                    let job = self.engine.get_job(&self.id).await?;
                    return Some(JobUpdate::from_job(&job));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

fn to_event(update: &JobUpdate) -> Result<Event, axum::Error> {
    Event::default().event(update.event).json_data(update)
}

/// GET /api/v1/jobs/{id}/stream
///
/// Sends the current snapshot, then one event per change. The stream ends
/// after the first terminal update.
pub async fn stream_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    // Subscribe before reading so no change falls between the two.
    let updates = state.engine.subscribe();
    let job = state
        .engine
        .get_job(&id)
        .await
        .ok_or_else(|| job_not_found(&id))?;

    let subscription = Subscription {
        engine: state.engine.clone(),
        id,
        updates,
        pending: Some(JobUpdate::from_job(&job)),
        finished: false,
    };

    let events = stream::unfold(subscription, |mut sub| async move {
        if sub.finished {
            return None;
        }
        let update = sub.next_update().await?;
        sub.finished = update.is_terminal();
        Some((to_event(&update), sub))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
