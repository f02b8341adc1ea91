//! Axum router and all HTTP handlers for vnq-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    api_types::{
        GateRefusedResponse, HealthResponse, KillSwitchResponse, OpenOrdersResponse,
        PlaceOrderRequest, PlaceOrderResponse,
    },
    state::{uptime_secs, AppState, BusMsg},
};
use vnq_execution::{place_order, OrderDraft, PlacementOutcome};
use vnq_schemas::OrderType;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/run/start", post(run_start))
        .route("/v1/run/stop", post(run_stop))
        .route("/v1/run/halt", post(run_halt))
        .route("/v1/killswitch/arm", post(killswitch_arm))
        .route("/v1/killswitch/disarm", post(killswitch_disarm))
        .route("/v1/orders/open", get(orders_open))
        .route("/v1/orders", post(orders_place))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let mut snap = st.status.read().await.clone();
    snap.daemon_uptime_secs = uptime_secs();

    {
        let limits = st.risk_limits.read().await;
        snap.kill_switch_armed = !limits.kill_switch_active;
    }

    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// POST /v1/run/start
// ---------------------------------------------------------------------------

/// Start a live run.
///
/// Returns `403 Forbidden` if the kill switch is active. Execution cannot
/// be started while trading is gated off.
pub(crate) async fn run_start(State(st): State<Arc<AppState>>) -> Response {
    if let Some(refusal) = kill_switch_refusal(&st).await {
        return refusal;
    }

    let mut s = st.status.write().await;

    if s.state != "running" {
        s.active_run_id = Some(derive_daemon_run_id(st.build.service, st.build.version));
    }
    s.state = "running".to_string();
    s.notes = Some("run started".to_string());
    s.daemon_uptime_secs = uptime_secs();

    {
        let limits = st.risk_limits.read().await;
        s.kill_switch_armed = !limits.kill_switch_active;
    }

    let snap = s.clone();
    drop(s);

    info!(run_id = ?snap.active_run_id, "run/start");
    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap)).into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/run/stop
// ---------------------------------------------------------------------------

pub(crate) async fn run_stop(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let mut s = st.status.write().await;

    s.active_run_id = None;
    s.state = "idle".to_string();
    s.notes = Some("run stopped".to_string());
    s.daemon_uptime_secs = uptime_secs();

    {
        let limits = st.risk_limits.read().await;
        s.kill_switch_armed = !limits.kill_switch_active;
    }

    let snap = s.clone();
    drop(s);

    info!("run/stop");
    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// POST /v1/run/halt
// ---------------------------------------------------------------------------

pub(crate) async fn run_halt(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    // Halt asserts the kill switch directly, so it is sticky across the
    // session: only an explicit arm call clears it.
    {
        let mut limits = st.risk_limits.write().await;
        limits.kill_switch_active = true;
    }

    let mut s = st.status.write().await;

    s.state = "halted".to_string();
    s.notes = Some("HALT asserted; kill switch engaged".to_string());
    s.daemon_uptime_secs = uptime_secs();
    s.kill_switch_armed = false;

    let snap = s.clone();
    drop(s);

    info!("run/halt");
    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// POST /v1/killswitch/arm
// ---------------------------------------------------------------------------

pub(crate) async fn killswitch_arm(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    {
        let mut limits = st.risk_limits.write().await;
        limits.kill_switch_active = false;
    }

    let (armed, active_run_id, state) = {
        let mut s = st.status.write().await;
        s.kill_switch_armed = true;
        (true, s.active_run_id, s.state.clone())
    };

    info!("killswitch/arm");
    let _ = st.bus.send(BusMsg::LogLine {
        level: "INFO".to_string(),
        msg: "kill switch armed".to_string(),
    });

    (
        StatusCode::OK,
        Json(KillSwitchResponse {
            armed,
            active_run_id,
            state,
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/killswitch/disarm
// ---------------------------------------------------------------------------

pub(crate) async fn killswitch_disarm(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    {
        let mut limits = st.risk_limits.write().await;
        limits.kill_switch_active = true;
    }

    let (armed, active_run_id, state) = {
        let mut s = st.status.write().await;
        s.kill_switch_armed = false;
        (false, s.active_run_id, s.state.clone())
    };

    info!("killswitch/disarm");
    let _ = st.bus.send(BusMsg::LogLine {
        level: "WARN".to_string(),
        msg: "kill switch DISARMED".to_string(),
    });

    (
        StatusCode::OK,
        Json(KillSwitchResponse {
            armed,
            active_run_id,
            state,
        }),
    )
}

/// Shared gate check for any route that dispatches trading activity.
async fn kill_switch_refusal(st: &Arc<AppState>) -> Option<Response> {
    let blocked = st.risk_limits.read().await.kill_switch_active;
    if !blocked {
        return None;
    }
    Some(
        (
            StatusCode::FORBIDDEN,
            Json(GateRefusedResponse {
                error: "GATE_REFUSED: kill switch active; arm it first".to_string(),
                gate: "kill_switch_armed".to_string(),
            }),
        )
            .into_response(),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/orders/open
// ---------------------------------------------------------------------------

pub(crate) async fn orders_open(State(st): State<Arc<AppState>>) -> Response {
    match st.order_store.find_open_orders().await {
        Ok(orders) => (
            StatusCode::OK,
            Json(OpenOrdersResponse {
                orders,
                as_of: Utc::now(),
            }),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "orders/open query failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// POST /v1/orders
// ---------------------------------------------------------------------------

pub(crate) async fn orders_place(
    State(st): State<Arc<AppState>>,
    Json(body): Json<PlaceOrderRequest>,
) -> Response {
    if let Some(refusal) = kill_switch_refusal(&st).await {
        return refusal;
    }

    let limit_price = vnq_schemas::Price::new(body.limit_price);
    let reference_price = vnq_schemas::Price::new(body.reference_price);

    let draft = OrderDraft {
        symbol: vnq_schemas::Symbol::new(body.symbol),
        exchange: body.exchange,
        side: body.side,
        order_type: OrderType::Lo,
        quantity: vnq_schemas::Quantity::new(body.quantity),
        limit_price,
        reference_price,
        pending_sell_qty: body.pending_sell_qty,
        idempotency_key: body.idempotency_key,
    };

    let (portfolio, limits, daily_loss) = {
        let portfolio = st.portfolio.read().await.clone();
        let limits = st.risk_limits.read().await.clone();
        let daily_loss = st.daily_pnl.read().await.to_daily_loss_state();
        (portfolio, limits, daily_loss)
    };

    let result = place_order(
        draft,
        &portfolio,
        &limits,
        &daily_loss,
        st.order_store.as_ref(),
        st.broker.as_ref(),
        st.audit.as_ref(),
        st.dry_run,
        Utc::now(),
    )
    .await;

    match result {
        Ok(placed) => {
            let outcome = match placed.outcome {
                PlacementOutcome::Replayed => "replayed",
                PlacementOutcome::RiskRejected => "risk_rejected",
                PlacementOutcome::Submitted => "submitted",
                PlacementOutcome::BrokerRejected => "broker_rejected",
            };
            let _ = st.bus.send(BusMsg::LogLine {
                level: "INFO".to_string(),
                msg: format!("order {} -> {outcome}", placed.order.order_id),
            });
            (
                StatusCode::OK,
                Json(PlaceOrderResponse {
                    order: placed.order,
                    outcome: outcome.to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "place_order failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Run-ID derivation
// ---------------------------------------------------------------------------

/// Derive a deterministic in-memory run ID from daemon build metadata.
///
/// No RNG: uses `Uuid::new_v5` over static `service`/`version` strings, so
/// the ID is stable for a given binary build rather than random per boot.
fn derive_daemon_run_id(service: &'static str, version: &'static str) -> Uuid {
    let data = format!("vnq-daemon.run.v1|{}|{}", service, version);
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, data.as_bytes())
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Status(_) => "status",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
