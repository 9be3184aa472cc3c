#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mvbot_core::job::{Job, JobResult, Origin};
use mvbot_engine::{work_fn, JobEngine, Notifier, NotifyError, WorkError, WorkFunction};
use tokio::sync::{mpsc, Semaphore};

/// How long helpers wait for an asynchronous condition before failing.
const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Notifier stub that counts calls and records the completed step count
/// of every progress snapshot it receives.
#[derive(Default)]
pub struct CountingNotifier {
    progress: AtomicUsize,
    finals: AtomicUsize,
    seen_steps: Mutex<Vec<u32>>,
    fail: bool,
}

impl CountingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A notifier whose every call fails after being counted.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn progress_calls(&self) -> usize {
        self.progress.load(Ordering::SeqCst)
    }

    pub fn final_calls(&self) -> usize {
        self.finals.load(Ordering::SeqCst)
    }

    pub fn seen_steps(&self) -> Vec<u32> {
        self.seen_steps.lock().unwrap().clone()
    }

    fn outcome(&self) -> Result<(), NotifyError> {
        if self.fail {
            Err(NotifyError::Delivery("remote returned HTTP 502".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn on_progress(&self, job: &Job) -> Result<(), NotifyError> {
        self.progress.fetch_add(1, Ordering::SeqCst);
        if let Some(progress) = &job.progress {
            self.seen_steps.lock().unwrap().push(progress.completed_steps);
        }
        // Yield so that a reordering bug would have a chance to show up.
        tokio::task::yield_now().await;
        self.outcome()
    }

    async fn on_final(&self, _job: &Job) -> Result<(), NotifyError> {
        self.finals.fetch_add(1, Ordering::SeqCst);
        self.outcome()
    }
}

pub fn github_origin() -> Origin {
    Origin {
        platform: "github".into(),
        repository: "acme/models".into(),
        thread_number: 42,
        user: Some("octocat".into()),
    }
}

/// Work function that reports `steps` steps, announcing each on `reached`
/// and then waiting for one permit on `gate` before continuing.
pub fn gated_steps(
    steps: u32,
    gate: Arc<Semaphore>,
    reached: mpsc::UnboundedSender<u32>,
) -> Arc<dyn WorkFunction> {
    work_fn(move |_job, progress, _cancel| {
        let gate = Arc::clone(&gate);
        let reached = reached.clone();
        async move {
            for i in 1..=steps {
                progress.report(&format!("step {i}"), i, steps).await?;
                let _ = reached.send(i);
                gate.acquire()
                    .await
                    .map_err(|e| WorkError::failed(e.to_string()))?
                    .forget();
            }
            Ok::<_, WorkError>(
                JobResult::success()
                    .with_metric("accuracy", 0.945)
                    .with_artifact("model.bin"),
            )
        }
    })
}

/// Work function that reports quick progress steps until cancelled.
pub fn endless() -> Arc<dyn WorkFunction> {
    work_fn(|_job, progress, _cancel| async move {
        let mut step = 0;
        while step < 1000 {
            step += 1;
            progress.report("looping", step, 1000).await?;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok::<_, WorkError>(JobResult::success())
    })
}

/// Work function that completes `steps` steps immediately.
pub fn instant(steps: u32) -> Arc<dyn WorkFunction> {
    work_fn(move |_job, progress, _cancel| async move {
        for i in 1..=steps {
            progress.report(&format!("step {i}"), i, steps).await?;
        }
        Ok::<_, WorkError>(JobResult::success())
    })
}

/// Poll until the job is terminal and its task has been cleaned up.
pub async fn wait_until_terminal(engine: &JobEngine, id: &str) -> Job {
    let done = tokio::time::timeout(WAIT_LIMIT, async {
        loop {
            if let Some(job) = engine.get_job(id).await {
                if job.status.is_terminal() && engine.running_tasks().await == 0 {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    done.unwrap_or_else(|_| panic!("job {id} did not reach a terminal state"))
}

/// Poll until `check` holds.
pub async fn wait_for(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT_LIMIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition was not met in time");
}
