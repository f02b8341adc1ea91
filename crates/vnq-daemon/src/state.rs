//! Shared runtime state for vnq-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use vnq_execution::{AuditSink, BrokerAdapter, OrderStore};
use vnq_pipeline::TickRepoPort;
use vnq_portfolio::DailyPnlTracker;
use vnq_resilience::ShutdownSignal;
use vnq_schemas::{PortfolioState, RiskLimit};

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of daemon state, returned by GET /v1/status and
/// carried inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub active_run_id: Option<Uuid>,
    /// "idle" | "running" | "halted"
    pub state: String,
    pub notes: Option<String>,
    /// Negation of `RiskLimit::kill_switch_active`: true = trading allowed.
    pub kill_switch_armed: bool,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Everything the composition root wires up once at startup and every
/// handler reaches through `Arc<AppState>`.
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub status: Arc<RwLock<StatusSnapshot>>,
    /// Operator-configured risk policy, including the kill switch. Read
    /// directly by `vnq-risk::validate_order` on every `place_order` call.
    pub risk_limits: Arc<RwLock<RiskLimit>>,
    pub portfolio: Arc<RwLock<PortfolioState>>,
    pub daily_pnl: Arc<RwLock<DailyPnlTracker>>,
    pub db: PgPool,
    pub order_store: Arc<dyn OrderStore>,
    pub tick_repo: Arc<dyn TickRepoPort>,
    pub broker: Arc<dyn BrokerAdapter>,
    /// Sink for `place_order`'s approve/reject/broker-reject outcomes.
    pub audit: Arc<dyn AuditSink>,
    pub shutdown: ShutdownSignal,
    /// Dry-run mode stops `place_order` short of the broker call; used by
    /// paper and backtest startup modes.
    pub dry_run: bool,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        build: BuildInfo,
        risk_limits: RiskLimit,
        portfolio: PortfolioState,
        daily_pnl: DailyPnlTracker,
        db: PgPool,
        order_store: Arc<dyn OrderStore>,
        tick_repo: Arc<dyn TickRepoPort>,
        broker: Arc<dyn BrokerAdapter>,
        audit: Arc<dyn AuditSink>,
        dry_run: bool,
    ) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        let initial_status = StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            active_run_id: None,
            state: "idle".to_string(),
            notes: Some("boot: kill switch armed fail-closed, awaiting operator disarm".to_string()),
            kill_switch_armed: !risk_limits.kill_switch_active,
        };

        Self {
            bus,
            build,
            status: Arc::new(RwLock::new(initial_status)),
            risk_limits: Arc::new(RwLock::new(risk_limits)),
            portfolio: Arc::new(RwLock::new(portfolio)),
            daily_pnl: Arc::new(RwLock::new(daily_pnl)),
            db,
            order_store,
            tick_repo,
            broker,
            audit,
            shutdown: ShutdownSignal::new(),
            dry_run,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Today's date in the exchange's local calendar, used to key the daily P&L
/// tracker's rollover. The daemon runs against Vietnamese markets only, so
/// this is a plain UTC->local-date conversion rather than a timezone
/// parameter threaded through every caller.
pub fn today_hose(now: chrono::DateTime<chrono::Utc>) -> NaiveDate {
    use chrono_tz::Asia::Ho_Chi_Minh;
    now.with_timezone(&Ho_Chi_Minh).date_naive()
}

#[allow(dead_code)]
fn _assert_decimal_in_scope(_: Decimal) {}
