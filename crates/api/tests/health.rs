//! Health endpoint and general HTTP behaviour.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, FAST_STEP};

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let (app, _engine) = build_test_app(FAST_STEP);
    let response = get(&app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["active_jobs"], 0);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let (app, _engine) = build_test_app(FAST_STEP);
    let response = get(&app, "/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let (app, _engine) = build_test_app(FAST_STEP);
    let response = get(&app, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("response must carry an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}
