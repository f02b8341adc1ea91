//! In-process scenario tests for vnq-daemon HTTP endpoints.
//!
//! These tests spin up the Axum router **without** binding a TCP socket.
//! Each test calls `routes::build_router` and drives it via
//! `tower::ServiceExt::oneshot` — no network I/O required.

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
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let router = routes::build_router(make_app_state());
    let (status, body) = call(router, req("GET", "/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "vnq-daemon");
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_returns_200_with_kill_switch_armed_field() {
    let router = routes::build_router(make_app_state());
    let (status, body) = call(router, req("GET", "/v1/status")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    // Fresh state: idle, no active run, disarmed (boot is fail-closed).
    assert_eq!(json["state"], "idle");
    assert!(json["active_run_id"].is_null());
    assert_eq!(
        json["kill_switch_armed"], false,
        "default state should be disarmed"
    );
}

// ---------------------------------------------------------------------------
// POST /v1/run/start
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_start_sets_state_running_and_returns_run_id() {
    let st = make_app_state();

    // Arm before starting (boot is fail-closed).
    let _ = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/killswitch/arm")).await;

    let (status, body) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/start")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["state"], "running");
    assert!(
        !json["active_run_id"].is_null(),
        "run_id should be set after start"
    );
}

// ---------------------------------------------------------------------------
// POST /v1/run/start is idempotent (same run_id on double-call)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_start_is_idempotent_keeps_run_id() {
    let st = make_app_state();

    let _ = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/killswitch/arm")).await;

    let (_, body1) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/start")).await;
    let run_id_first = parse_json(body1)["active_run_id"].clone();

    let (_, body2) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/start")).await;
    let run_id_second = parse_json(body2)["active_run_id"].clone();

    assert_eq!(
        run_id_first, run_id_second,
        "second start should preserve existing run_id"
    );
}

// ---------------------------------------------------------------------------
// POST /v1/run/stop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_stop_sets_state_idle_and_clears_run_id() {
    let st = make_app_state();

    let _ = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/killswitch/arm")).await;
    let _ = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/start")).await;

    let (status, body) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/stop")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["state"], "idle");
    assert!(json["active_run_id"].is_null(), "run_id cleared after stop");
}

// ---------------------------------------------------------------------------
// POST /v1/run/halt
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_halt_sets_state_halted_and_preserves_run_id() {
    let st = make_app_state();

    let _ = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/killswitch/arm")).await;

    let (_, start_body) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/start")).await;
    let run_id = parse_json(start_body)["active_run_id"].clone();

    let (status, body) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/halt")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["state"], "halted");
    assert_eq!(
        json["active_run_id"], run_id,
        "halt should preserve run_id for GUI display"
    );
}

// ---------------------------------------------------------------------------
// POST /v1/killswitch/arm
// ---------------------------------------------------------------------------

#[tokio::test]
async fn killswitch_arm_sets_armed_true() {
    let st = make_app_state();

    // Disarm first so we can verify arm actually changes state.
    let _ = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/killswitch/disarm")).await;

    let (status, body) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/killswitch/arm")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["armed"], true, "arm should set armed=true");
}

// ---------------------------------------------------------------------------
// POST /v1/killswitch/disarm
// ---------------------------------------------------------------------------

#[tokio::test]
async fn killswitch_disarm_sets_armed_false() {
    let st = make_app_state();

    let (status, body) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/killswitch/disarm")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["armed"], false, "disarm should set armed=false");
}

// ---------------------------------------------------------------------------
// Status reflects killswitch arm/disarm
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_reflects_killswitch_armed_flag() {
    let st = make_app_state();

    // Default: disarmed (boot is fail-closed).
    let (_, body) = call(routes::build_router(Arc::clone(&st)), req("GET", "/v1/status")).await;
    assert_eq!(parse_json(body)["kill_switch_armed"], false);

    // Disarm (idempotent — already disarmed at boot).
    let _ = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/killswitch/disarm")).await;

    // Status still shows false.
    let (_, body) = call(routes::build_router(Arc::clone(&st)), req("GET", "/v1/status")).await;
    assert_eq!(parse_json(body)["kill_switch_armed"], false);

    // Arm again.
    let _ = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/killswitch/arm")).await;

    // Status back to true.
    let (_, body) = call(routes::build_router(Arc::clone(&st)), req("GET", "/v1/status")).await;
    assert_eq!(parse_json(body)["kill_switch_armed"], true);
}

// ---------------------------------------------------------------------------
// run_start refused (403) when kill switch is disarmed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_start_refused_403_when_kill_switch_disarmed() {
    let st = make_app_state();

    // Disarm first.
    let _ = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/killswitch/disarm")).await;

    // Now try to start — must be refused.
    let (status, body) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/start")).await;
    assert_eq!(
        status,
        StatusCode::FORBIDDEN,
        "run/start must be 403 when kill switch is disarmed"
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

#[tokio::test]
async fn run_start_succeeds_after_rearm() {
    let st = make_app_state();

    // Disarm.
    let _ = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/killswitch/disarm")).await;

    // Confirm 403 while disarmed.
    let (status, _) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/start")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Re-arm.
    let _ = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/killswitch/arm")).await;

    // Now start must succeed.
    let (status2, body2) = call(routes::build_router(Arc::clone(&st)), req("POST", "/v1/run/start")).await;
    assert_eq!(status2, StatusCode::OK);
    let json = parse_json(body2);
    assert_eq!(json["state"], "running");
}

// ---------------------------------------------------------------------------
// Unknown routes return 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let router = routes::build_router(make_app_state());
    let (status, _) = call(router, req("GET", "/v1/does_not_exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
