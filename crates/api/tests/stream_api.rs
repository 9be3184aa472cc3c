//! Integration tests for job streaming and external callbacks.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{
    body_json, body_text, build_test_app, get, post_json, start, wait_until_terminal, SLOW_STEP,
};

// ---------------------------------------------------------------------------
// GET /jobs/{id}/stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_of_terminal_job_sends_snapshot_and_ends() {
    let (app, engine) = build_test_app(common::FAST_STEP);
    let id = start(&app, serde_json::json!({ "id": "done", "kind": "test" })).await;
    wait_until_terminal(&engine, &id).await;

    let response = get(&app, "/api/v1/jobs/done/stream").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let body = body_text(response).await;
    assert!(body.contains("event: job_completed"));
    assert!(body.contains(r#""id":"done""#));
    assert_eq!(body.matches("event: ").count(), 1);
}

#[tokio::test]
async fn stream_follows_running_job_until_cancelled() {
    let (app, engine) = build_test_app(SLOW_STEP);
    start(&app, serde_json::json!({ "id": "live", "kind": "train" })).await;

    let response = get(&app, "/api/v1/jobs/live/stream").await;
    assert_eq!(response.status(), StatusCode::OK);
    let collected = tokio::spawn(body_text(response));

    assert!(engine.cancel("live", "stop").await);

    let body = tokio::time::timeout(Duration::from_secs(5), collected)
        .await
        .expect("stream did not end after cancel")
        .unwrap();
    let progress = body.find("event: job_progress").unwrap();
    let cancelled = body.find("event: job_cancelled").unwrap();
    assert!(progress < cancelled);
    assert!(body.contains("Job cancelled: stop"));
}

#[tokio::test]
async fn stream_of_unknown_job_is_404() {
    let (app, _engine) = build_test_app(SLOW_STEP);

    let response = get(&app, "/api/v1/jobs/nope/stream").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// POST /jobs/{id}/callback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn callback_appends_to_log_without_changing_status() {
    let (app, engine) = build_test_app(SLOW_STEP);
    start(&app, serde_json::json!({ "id": "cb", "kind": "eval" })).await;

    let response = post_json(
        &app,
        "/api/v1/jobs/cb/callback",
        serde_json::json!({ "status": "completed", "message": "report uploaded" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["job_id"], "cb");
    assert_eq!(json["data"]["status"], "received");

    let job = engine.get_job("cb").await.unwrap();
    assert_eq!(
        job.log.last().map(|entry| entry.message.as_str()),
        Some("External callback received: report uploaded")
    );
    assert!(!job.status.is_terminal());
}

#[tokio::test]
async fn callback_for_unknown_job_is_404() {
    let (app, _engine) = build_test_app(SLOW_STEP);

    let response = post_json(
        &app,
        "/api/v1/jobs/ghost/callback",
        serde_json::json!({ "status": "failed" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
