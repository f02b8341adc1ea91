//! Scenario: halt is a sticky deadman switch that blocks dispatch.
//!
//! # Invariant under test
//!
//! `POST /v1/run/halt` sets `RiskLimit::kill_switch_active = true`. Because
//! every dispatch route shares the same `kill_switch_refusal` gate, a
//! subsequent `POST /v1/run/start` returns 403 until the operator explicitly
//! calls `POST /v1/killswitch/arm` — the sole escape from a halted state.
//!
//! Three tests:
//!
//! 1. After halt, run/start returns 403 (deadman blocks dispatch).
//! 2. After halt, GET /v1/status reports `kill_switch_armed: false`.
//! 3. After halt then explicit arm, run/start succeeds.
//!
//! All tests are pure in-process; no DB or network required.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt; // oneshot
use vnq_daemon::{routes, state::AppState};

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

/// Arm the kill switch (required before any run can start).
async fn arm(st: &Arc<AppState>) {
    let (status, _) = call(routes::build_router(Arc::clone(st)), req("POST", "/v1/killswitch/arm")).await;
    assert_eq!(status, StatusCode::OK, "arm must succeed");
}

/// Halt the run (sets kill_switch_active = true).
async fn halt(st: &Arc<AppState>) {
    let (status, _) = call(routes::build_router(Arc::clone(st)), req("POST", "/v1/run/halt")).await;
    assert_eq!(status, StatusCode::OK, "halt must succeed");
}

// ---------------------------------------------------------------------------
// 1. run/start returns 403 after halt (deadman blocks dispatch)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_start_returns_403_after_halt() {
    let st = make_app_state();

    // Arm first so the halt is meaningful (arm then halt, not just boot-disarmed).
    arm(&st).await;
    halt(&st).await;

    let (status, body) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/start")).await;

    assert_eq!(
        status,
        StatusCode::FORBIDDEN,
        "run/start must be 403 after halt (deadman sticky)"
    );
    let json = parse_json(body);
    assert!(
        json["error"]
            .as_str()
            .unwrap_or("")
            .contains("GATE_REFUSED"),
        "body should contain GATE_REFUSED: {json}"
    );
}

// ---------------------------------------------------------------------------
// 2. Status reports kill_switch_armed = false after halt
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_shows_not_armed_after_halt() {
    let st = make_app_state();

    arm(&st).await;
    halt(&st).await;

    let (_, body) = call(routes::build_router(Arc::clone(&st)), req("GET", "/v1/status")).await;
    let json = parse_json(body);

    assert_eq!(
        json["kill_switch_armed"], false,
        "status must report kill_switch_armed=false after halt"
    );
}

// ---------------------------------------------------------------------------
// 3. After halt then explicit arm, run/start succeeds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_start_succeeds_after_halt_then_arm() {
    let st = make_app_state();

    arm(&st).await;
    halt(&st).await;

    // Confirm blocked.
    let (status, _) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/start")).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "must be blocked after halt");

    // Re-arm — the sole escape from a halted state.
    arm(&st).await;

    // Now start succeeds.
    let (status, body) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/start")).await;

    assert_eq!(
        status,
        StatusCode::OK,
        "run/start must succeed after halt + explicit arm"
    );
    let json = parse_json(body);
    assert_eq!(json["state"], "running");
    assert!(
        !json["active_run_id"].is_null(),
        "run_id should be set after start"
    );
}
