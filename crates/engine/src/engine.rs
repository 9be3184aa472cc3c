//! The job table and the per-job execution tasks.
//!
//! [`JobEngine`] is a cheaply cloneable handle around a single
//! `RwLock`-guarded table. Every mutation of a job (start, progress,
//! completion, cancellation) happens under the write lock, and the
//! insert-check-spawn sequence of [`JobEngine::start`] runs as one critical
//! section so no id can ever get two tasks.
//!
//! A spawned task must take the same lock before it runs the work
//! function. If `cancel` got there first the task sees a non-Running job
//! and exits without touching it, so a job cancelled while Pending never
//! executes a single step.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use indexmap::IndexMap;
use mvbot_core::job::{Job, JobKind, JobResult, JobStatus, LogEntry};
use mvbot_core::job_events::{terminal_event, EVENT_JOB_PROGRESS};
use mvbot_core::types::JobId;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, WorkError};
use crate::notifier::Notifier;
use crate::progress::ProgressReporter;
use crate::registry::{WorkFunction, WorkRegistry};
use crate::updates::{JobUpdate, UPDATE_CHANNEL_CAPACITY};

/// Reason recorded on jobs cancelled by [`JobEngine::shutdown`].
pub const SHUTDOWN_REASON: &str = "server shutting down";

/// Log line appended when a running task observes cancellation.
const EXECUTION_CANCELLED: &str = "Job execution cancelled";

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Update queued for a job's notification forwarder.
pub(crate) enum Notification {
    Progress(Job),
    /// Completed or Failed snapshot, with its event name.
    Final(Job, &'static str),
}

pub(crate) type NotifySender = mpsc::UnboundedSender<Notification>;

/// Bookkeeping for a job whose task has not finished yet.
struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub(crate) struct JobTable {
    /// Every job ever started, in insertion order.
    pub(crate) jobs: IndexMap<JobId, Job>,
    tasks: HashMap<JobId, RunningTask>,
}

pub(crate) struct Shared {
    pub(crate) table: RwLock<JobTable>,
    registry: WorkRegistry,
    notifier: Arc<dyn Notifier>,
    /// Parent of every per-job token; cancelled on shutdown.
    shutdown: CancellationToken,
    updates: broadcast::Sender<JobUpdate>,
}

impl Shared {
    /// Publish the current state of `job` to stream subscribers.
    ///
    /// Called with the table lock held so updates leave in the order the
    /// changes were made.
    pub(crate) fn publish(&self, job: &Job) {
        // No receivers is not an error.
        let _ = self.updates.send(JobUpdate::from_job(job));
    }
}

// ---------------------------------------------------------------------------
// JobEngine
// ---------------------------------------------------------------------------

/// Owns the job table and drives execution.
///
/// Created once at startup; clone the handle into whichever component
/// needs it.
#[derive(Clone)]
pub struct JobEngine {
    pub(crate) shared: Arc<Shared>,
}

impl JobEngine {
    /// Build an engine with a fixed set of work functions and a notifier.
    pub fn new(registry: WorkRegistry, notifier: Arc<dyn Notifier>) -> Self {
        tracing::info!(kinds = ?registry.kinds(), "Job engine created");
        Self {
            shared: Arc::new(Shared {
                table: RwLock::new(JobTable::default()),
                registry,
                notifier,
                shutdown: CancellationToken::new(),
                updates: broadcast::channel(UPDATE_CHANNEL_CAPACITY).0,
            }),
        }
    }

    /// Insert `job`, move it to Running and spawn its execution task.
    ///
    /// Nothing is stored when this returns an error.
    pub async fn start(&self, mut job: Job) -> Result<(), EngineError> {
        let work = self
            .shared
            .registry
            .get(job.kind)
            .ok_or(EngineError::UnregisteredKind(job.kind))?;

        let mut table = self.shared.table.write().await;

        // Shutdown cancels its token under this lock.
        if self.shared.shutdown.is_cancelled() {
            return Err(EngineError::ShuttingDown);
        }

        if table.jobs.contains_key(&job.id) {
            tracing::error!(job_id = %job.id, "Job already exists");
            return Err(EngineError::DuplicateJob(job.id));
        }

        if !job.mark_started() {
            return Err(EngineError::NotPending {
                id: job.id,
                status: job.status,
            });
        }

        let id = job.id.clone();
        let kind = job.kind;
        self.shared.publish(&job);
        let notify = job
            .origin
            .is_some()
            .then(|| spawn_notification_forwarder(Arc::clone(&self.shared), id.clone()));
        table.jobs.insert(id.clone(), job);

        let cancel = self.shared.shutdown.child_token();
        let handle = tokio::spawn(run_job(
            Arc::clone(&self.shared),
            id.clone(),
            work,
            cancel.clone(),
            notify,
        ));
        table.tasks.insert(id.clone(), RunningTask { cancel, handle });

        tracing::info!(job_id = %id, kind = %kind, "Job started");
        Ok(())
    }

    /// Whether a work function is registered for `kind`.
    pub fn supports(&self, kind: JobKind) -> bool {
        self.shared.registry.is_registered(kind)
    }

    /// Point-in-time snapshot of a single job.
    pub async fn get_job(&self, id: &str) -> Option<Job> {
        self.shared.table.read().await.jobs.get(id).cloned()
    }

    /// Snapshots of every Pending or Running job, in insertion order.
    pub async fn active_jobs(&self) -> Vec<Job> {
        self.shared
            .table
            .read()
            .await
            .jobs
            .values()
            .filter(|job| job.status.is_active())
            .cloned()
            .collect()
    }

    /// Snapshots of every job in the table, in insertion order.
    pub async fn list_jobs(&self) -> Vec<Job> {
        self.shared.table.read().await.jobs.values().cloned().collect()
    }

    /// The last `n` log entries of a job.
    pub async fn log_tail(&self, id: &str, n: usize) -> Option<Vec<LogEntry>> {
        self.shared
            .table
            .read()
            .await
            .jobs
            .get(id)
            .map(|job| job.log_tail(n).to_vec())
    }

    /// Receive every [`JobUpdate`] published from now on, for all jobs.
    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.shared.updates.subscribe()
    }

    /// Append an externally supplied line to a job's log.
    ///
    /// Allowed in any status; the job's state is not otherwise touched.
    /// Returns `false` for an unknown id.
    pub async fn append_log(&self, id: &str, message: impl Into<String>) -> bool {
        let mut table = self.shared.table.write().await;
        let Some(job) = table.jobs.get_mut(id) else {
            return false;
        };
        job.add_log(message);
        self.shared.publish(job);
        true
    }

    /// Number of execution tasks that have not finished yet.
    pub async fn running_tasks(&self) -> usize {
        self.shared.table.read().await.tasks.len()
    }

    /// Request cancellation of a job.
    ///
    /// Returns `false` only for an unknown id. A job that is already
    /// terminal is left untouched and `true` is returned. Does not wait
    /// for the task to stop.
    pub async fn cancel(&self, id: &str, reason: &str) -> bool {
        let mut table = self.shared.table.write().await;
        if !table.jobs.contains_key(id) {
            return false;
        }

        if let Some(task) = table.tasks.remove(id) {
            task.cancel.cancel();
        }

        if let Some(job) = table.jobs.get_mut(id) {
            if job.mark_cancelled(reason) {
                self.shared.publish(job);
                tracing::info!(job_id = %id, reason, "Job cancelled");
            } else {
                tracing::debug!(job_id = %id, status = %job.status, "Cancel of terminal job ignored");
            }
        }
        true
    }

    /// Cancel every running task and wait up to `grace` for each to exit.
    ///
    /// Subsequent [`start`](Self::start) calls fail with
    /// [`EngineError::ShuttingDown`].
    pub async fn shutdown(&self, grace: Duration) {
        tracing::info!("Shutting down job engine");

        // Jobs are marked before any token fires, so a task waking on
        // cancellation finds its job already terminal with this reason.
        let handles: Vec<(JobId, JoinHandle<()>)> = {
            let mut table = self.shared.table.write().await;
            let drained: Vec<(JobId, RunningTask)> = table.tasks.drain().collect();
            for (id, _) in &drained {
                if let Some(job) = table.jobs.get_mut(id) {
                    if job.mark_cancelled(SHUTDOWN_REASON) {
                        self.shared.publish(job);
                    }
                }
            }
            self.shared.shutdown.cancel();
            drained
                .into_iter()
                .map(|(id, task)| (id, task.handle))
                .collect()
        };

        for (id, handle) in handles {
            if tokio::time::timeout(grace, handle).await.is_err() {
                tracing::warn!(job_id = %id, "Job task did not stop within grace period");
            }
        }

        tracing::info!("Job engine shut down complete");
    }
}

// ---------------------------------------------------------------------------
// Task body
// ---------------------------------------------------------------------------

/// Execute one job's work function and finalize its state.
async fn run_job(
    shared: Arc<Shared>,
    id: JobId,
    work: Arc<dyn WorkFunction>,
    cancel: CancellationToken,
    notify: Option<NotifySender>,
) {
    let job = {
        let mut table = shared.table.write().await;
        let snapshot = match table.jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Running => {
                job.add_log(format!("Starting {} job execution", job.kind));
                Some(job.clone())
            }
            _ => None,
        };
        match snapshot {
            Some(job) => job,
            None => {
                table.tasks.remove(&id);
                tracing::debug!(job_id = %id, "Job no longer running, task exits without executing");
                return;
            }
        }
    };

    let reporter = ProgressReporter::new(
        Arc::clone(&shared),
        id.clone(),
        cancel.clone(),
        notify.clone(),
    );
    let execution = AssertUnwindSafe(work.run(job, reporter, cancel.clone())).catch_unwind();

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WorkError::Cancelled),
        caught = execution => match caught {
            Ok(outcome) => outcome,
            Err(panic) => Err(WorkError::Failed(panic_message(panic.as_ref()))),
        },
    };

    finish(&shared, &id, outcome, notify).await;
}

/// Record the task outcome and queue the final notification.
async fn finish(
    shared: &Shared,
    id: &str,
    outcome: Result<JobResult, WorkError>,
    notify: Option<NotifySender>,
) {
    let final_snapshot = {
        let mut table = shared.table.write().await;
        table.tasks.remove(id);

        let Some(job) = table.jobs.get_mut(id) else {
            return;
        };

        match outcome {
            Ok(result) => {
                let success = result.success;
                if job.mark_completed(result) {
                    shared.publish(job);
                    tracing::info!(job_id = %id, status = %job.status, success, "Job completed");
                    Some(job.clone())
                } else {
                    tracing::debug!(job_id = %id, status = %job.status, "Result discarded, job already terminal");
                    None
                }
            }
            Err(WorkError::Cancelled) => {
                job.mark_cancelled("");
                if job.status == JobStatus::Cancelled {
                    job.add_log(EXECUTION_CANCELLED);
                    shared.publish(job);
                }
                tracing::info!(job_id = %id, "Job execution cancelled");
                None
            }
            Err(WorkError::Failed(message)) => {
                if job.status == JobStatus::Running {
                    let error = format!("Job execution failed: {message}");
                    job.add_log(error.clone());
                    job.mark_completed(JobResult::failure(error));
                    shared.publish(job);
                    tracing::error!(job_id = %id, error = %message, "Job execution failed");
                    Some(job.clone())
                } else {
                    tracing::debug!(job_id = %id, status = %job.status, "Failure discarded, job already terminal");
                    None
                }
            }
        }
    };

    if let (Some(job), Some(tx)) = (final_snapshot, notify) {
        if let Some(event) = terminal_event(job.status) {
            let _ = tx.send(Notification::Final(job, event));
        }
    }
}

/// Best-effort text for a caught panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("work function panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("work function panicked: {s}")
    } else {
        "work function panicked".to_string()
    }
}

// ---------------------------------------------------------------------------
// Notification forwarding
// ---------------------------------------------------------------------------

/// Spawn the task that delivers one job's notifications in order.
///
/// The task exits once every sender (the reporter and the task body) is
/// dropped.
fn spawn_notification_forwarder(shared: Arc<Shared>, id: JobId) -> NotifySender {
    let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();

    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            let (event, outcome) = match &notification {
                Notification::Progress(job) => {
                    (EVENT_JOB_PROGRESS, shared.notifier.on_progress(job).await)
                }
                Notification::Final(job, event) => (*event, shared.notifier.on_final(job).await),
            };

            if let Err(e) = outcome {
                tracing::warn!(job_id = %id, event, error = %e, "Job notification failed");
                if let Some(job) = shared.table.write().await.jobs.get_mut(&id) {
                    job.add_log(format!("Notification failed ({event}): {e}"));
                }
            }
        }
    });

    tx
}
