//! Job lifecycle engine.
//!
//! - [`JobEngine`] owns the job table, spawns one cancellable task per
//!   running job, and finalizes state when the task ends.
//! - [`WorkRegistry`] binds each [`JobKind`](mvbot_core::job::JobKind) to
//!   the [`WorkFunction`] that performs it.
//! - [`Notifier`] is the outbound port for progress and completion updates.
//! - [`ProgressReporter`] is the callback handed to work functions.
//! - [`supervisor`] cancels jobs that exceed a running-time budget.
//! - [`JobUpdate`]s are broadcast to stream subscribers after every change.

pub mod engine;
pub mod error;
pub mod notifier;
pub mod progress;
pub mod registry;
pub mod status;
pub mod supervisor;
pub mod updates;

pub use engine::JobEngine;
pub use error::{EngineError, WorkError};
pub use notifier::{LogNotifier, Notifier, NotifyError};
pub use progress::ProgressReporter;
pub use registry::{work_fn, WorkFunction, WorkRegistry};
pub use status::JobSummary;
pub use updates::JobUpdate;
