use std::sync::Arc;

use mvbot_engine::JobEngine;
use mvbot_github::GitHubClient;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: the engine is a handle and everything else is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub engine: JobEngine,
    pub config: Arc<ServerConfig>,
    /// Present when a GitHub token is configured; used to post the initial
    /// comment for jobs that arrive without a notification handle.
    pub github: Option<Arc<GitHubClient>>,
}
