//! Scenario: daemon boot is fail-closed.
//!
//! # Invariant under test
//!
//! `main.rs::read_risk_limits` hardcodes `kill_switch_active: true`
//! regardless of config file content, and `AppState::new` derives
//! `kill_switch_armed` as its negation. The daemon must require an explicit
//! operator arm before any execution is permitted.
//!
//! Three tests:
//!
//! 1. Fresh status snapshot exposes `kill_switch_armed: false`.
//! 2. `POST /v1/run/start` returns 403 on a fresh (never-armed) daemon.
//! 3. `POST /v1/run/start` succeeds after an explicit arm.
//!
//! All tests are pure in-process; no DB or network required.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt; // oneshot
use vnq_daemon::routes;

mod common;
use common::make_app_state;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn req(method: &str, uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

// ---------------------------------------------------------------------------
// 1. Fresh status snapshot reports kill_switch_armed = false
// ---------------------------------------------------------------------------

#[tokio::test]
async fn boot_status_reports_kill_switch_disarmed() {
    let st = make_app_state();

    let (status, body) = call(routes::build_router(Arc::clone(&st)), req("GET", "/v1/status")).await;

    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(
        json["kill_switch_armed"], false,
        "daemon must boot disarmed (fail-closed)"
    );
}

// ---------------------------------------------------------------------------
// 2. run/start returns 403 before any arm call
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_start_returns_403_before_arm() {
    let st = make_app_state();

    let (status, body) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/start")).await;

    assert_eq!(
        status,
        StatusCode::FORBIDDEN,
        "run/start must be blocked at boot (kill switch never armed)"
    );
    let json = parse_json(body);
    assert!(
        json["error"]
            .as_str()
            .unwrap_or("")
            .contains("GATE_REFUSED"),
        "body should contain GATE_REFUSED: {json}"
    );
    assert_eq!(json["gate"], "kill_switch_armed");
}

// ---------------------------------------------------------------------------
// 3. run/start succeeds after explicit arm
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_start_succeeds_after_explicit_arm() {
    let st = make_app_state();

    let (arm_status, _) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/killswitch/arm")).await;
    assert_eq!(arm_status, StatusCode::OK, "arm must succeed");

    let (status, body) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/start")).await;

    assert_eq!(
        status,
        StatusCode::OK,
        "run/start must succeed after explicit arm"
    );
    let json = parse_json(body);
    assert_eq!(json["state"], "running");
    assert!(
        !json["active_run_id"].is_null(),
        "run_id should be set after start"
    );
}
