//! Simulated work functions for the model validation bot.
//!
//! Stand-ins for the real training, evaluation and test backends: each
//! walks through the same named phases a real run reports, sleeping for a
//! configurable duration per phase, and returns a result shaped like the
//! real one. [`default_registry`] binds them to their job kinds.

pub mod simulators;

use std::sync::Arc;
use std::time::Duration;

use mvbot_core::job::JobKind;
use mvbot_engine::{EngineError, WorkRegistry};

pub use simulators::{EvalSimulator, PipelineSimulator, TestSimulator, TrainSimulator};

/// Default duration of one simulated phase.
pub const DEFAULT_STEP_DURATION: Duration = Duration::from_millis(1000);

/// Build the registry used by the server.
///
/// Train, Eval, Test and Pipeline are bound to simulators.
/// `ModelValidation` has no backend yet and stays unregistered, so starting
/// such a job is rejected by the engine.
pub fn default_registry(step_duration: Duration) -> Result<WorkRegistry, EngineError> {
    WorkRegistry::new()
        .with(JobKind::Train, Arc::new(TrainSimulator::new(step_duration)))?
        .with(JobKind::Eval, Arc::new(EvalSimulator::new(step_duration)))?
        .with(JobKind::Test, Arc::new(TestSimulator::new(step_duration)))?
        .with(JobKind::Pipeline, Arc::new(PipelineSimulator::new(step_duration)))
}
