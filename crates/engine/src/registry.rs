//! Work function registry.
//!
//! Each [`JobKind`] is bound to at most one [`WorkFunction`] when the
//! registry is built. The registry is moved into the engine at
//! construction and is immutable from then on.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use mvbot_core::job::{Job, JobKind, JobResult};
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, WorkError};
use crate::progress::ProgressReporter;

/// A procedure that performs one kind of job.
///
/// Implementations report each named step through `progress` and should
/// stop promptly once `cancel` fires or a report returns
/// [`WorkError::Cancelled`].
#[async_trait]
pub trait WorkFunction: Send + Sync {
    async fn run(
        &self,
        job: Job,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<JobResult, WorkError>;
}

/// Adapter that lets a closure returning a future act as a [`WorkFunction`].
struct FnWork<F>(F);

#[async_trait]
impl<F, Fut> WorkFunction for FnWork<F>
where
    F: Fn(Job, ProgressReporter, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<JobResult, WorkError>> + Send + 'static,
{
    async fn run(
        &self,
        job: Job,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<JobResult, WorkError> {
        (self.0)(job, progress, cancel).await
    }
}

/// Wrap a closure as a shareable work function.
pub fn work_fn<F, Fut>(f: F) -> Arc<dyn WorkFunction>
where
    F: Fn(Job, ProgressReporter, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<JobResult, WorkError>> + Send + 'static,
{
    Arc::new(FnWork(f))
}

/// Mapping from job kind to the work function that performs it.
#[derive(Clone, Default)]
pub struct WorkRegistry {
    functions: HashMap<JobKind, Arc<dyn WorkFunction>>,
}

impl WorkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `kind` to `function`. Rejects a second binding for the same kind.
    pub fn register(
        &mut self,
        kind: JobKind,
        function: Arc<dyn WorkFunction>,
    ) -> Result<(), EngineError> {
        if self.functions.contains_key(&kind) {
            return Err(EngineError::DuplicateRegistration(kind));
        }
        self.functions.insert(kind, function);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, kind: JobKind, function: Arc<dyn WorkFunction>) -> Result<Self, EngineError> {
        self.register(kind, function)?;
        Ok(self)
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn WorkFunction>> {
        self.functions.get(&kind).cloned()
    }

    pub fn is_registered(&self, kind: JobKind) -> bool {
        self.functions.contains_key(&kind)
    }

    /// Registered kinds in declaration order.
    pub fn kinds(&self) -> Vec<JobKind> {
        let mut kinds: Vec<JobKind> = self.functions.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for WorkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
