#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use mvbot_api::config::ServerConfig;
use mvbot_api::router::build_app_router;
use mvbot_api::state::AppState;
use mvbot_core::job::Job;
use mvbot_engine::{JobEngine, LogNotifier};
use mvbot_github::GitHubClient;
use tower::ServiceExt;

/// Phase length short enough for jobs to finish within a test.
pub const FAST_STEP: Duration = Duration::from_millis(5);

/// Phase length long enough that a job is still Running when inspected.
pub const SLOW_STEP: Duration = Duration::from_secs(60);

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 1,
        github_token: None,
        github_api_url: "http://127.0.0.1:9".to_string(),
        job_timeout_secs: 0,
        supervisor_interval_secs: 30,
        simulation_step_millis: FAST_STEP.as_millis() as u64,
    }
}

/// Build the full application router over a fresh engine whose simulated
/// phases take `step`. The engine handle is returned alongside so tests
/// can inspect state directly.
pub fn build_test_app(step: Duration) -> (Router, JobEngine) {
    build_test_app_with_github(step, None)
}

pub fn build_test_app_with_github(
    step: Duration,
    github: Option<Arc<GitHubClient>>,
) -> (Router, JobEngine) {
    let state = test_state(step, github);
    let engine = state.engine.clone();
    (build_app_router(state, &test_config()), engine)
}

/// Application state over a fresh engine, for calling handlers directly.
pub fn test_state(step: Duration, github: Option<Arc<GitHubClient>>) -> AppState {
    let config = test_config();
    let registry = mvbot_worker::default_registry(step).unwrap();
    AppState {
        engine: JobEngine::new(registry, Arc::new(LogNotifier)),
        config: Arc::new(config),
        github,
    }
}

pub async fn get(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_empty(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Start a job through the API and return its id.
pub async fn start(app: &Router, body: serde_json::Value) -> String {
    let response = post_json(app, "/api/v1/jobs", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["id"].as_str().unwrap().to_string()
}

/// Poll until the job is terminal and its task has exited.
pub async fn wait_until_terminal(engine: &JobEngine, id: &str) -> Job {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(job) = engine.get_job(id).await {
                if job.status.is_terminal() && engine.running_tasks().await == 0 {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("job {id} did not reach a terminal state"))
}
