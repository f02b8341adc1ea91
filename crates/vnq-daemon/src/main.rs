//! vnq-daemon entry point.
//!
//! This file is intentionally thin: it resolves config/secrets, builds the
//! shared state, wires middleware, and starts the HTTP server. All route
//! handlers live in `routes.rs`; all shared state types live in `state.rs`.

use std::{net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use chrono::Utc;
use rsa::{pkcs1::DecodeRsaPrivateKey, pkcs8::DecodePrivateKey, RsaPrivateKey};
use rust_decimal::Decimal;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

use vnq_broker::{SsiRestBroker, SsiRestBrokerConfig};
use vnq_config::secrets::resolve_secrets_for_mode;
use vnq_daemon::{market_data, routes, state};
use vnq_db::{PgAuditSink, PgOrderStore, PgTickRepo};
use vnq_resilience::ShutdownSignal;
use vnq_schemas::{CashBalance, PortfolioState, RiskLimit};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let mode = std::env::var("VNQ_ENGINE_MODE").unwrap_or_else(|_| "PAPER".to_string());
    let config_paths_owned: Vec<String> = std::env::var("VNQ_CONFIG_PATHS")
        .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_else(|_| vec!["config/base.yaml".to_string()]);
    let config_paths: Vec<&str> = config_paths_owned.iter().map(String::as_str).collect();

    let loaded = vnq_config::load_layered_yaml(&config_paths)
        .context("failed to load layered config")?;
    info!(config_hash = %loaded.config_hash, mode = %mode, "config loaded");

    let secrets = resolve_secrets_for_mode(&loaded.config_json, &mode)
        .context("failed to resolve secrets for mode")?;

    let db = vnq_db::connect_from_env()
        .await
        .context("failed to connect to database")?;
    vnq_db::migrate(&db).await.context("failed to run migrations")?;

    let order_store: Arc<dyn vnq_execution::OrderStore> = Arc::new(PgOrderStore::new(db.clone()));
    let tick_repo: Arc<dyn vnq_pipeline::TickRepoPort> = Arc::new(PgTickRepo::new(db.clone()));
    let audit: Arc<dyn vnq_execution::AuditSink> = Arc::new(PgAuditSink::new(db.clone()));

    let broker: Arc<dyn vnq_execution::BrokerAdapter> = build_broker(&secrets, &mode)?;

    let risk_limits = read_risk_limits(&loaded.config_json);
    let portfolio = PortfolioState {
        positions: Vec::new(),
        cash: CashBalance {
            cash_bal: Decimal::ZERO,
            purchasing_power: Decimal::ZERO,
            pending_settlement: Decimal::ZERO,
        },
        synced_at: Utc::now(),
    };
    let daily_pnl = vnq_portfolio::DailyPnlTracker::new(
        state::today_hose(Utc::now()),
        risk_limits.max_daily_loss,
    );

    let build = state::BuildInfo {
        service: "vnq-daemon",
        version: env!("CARGO_PKG_VERSION"),
    };

    let shared = Arc::new(state::AppState::new(
        build,
        risk_limits,
        portfolio,
        daily_pnl,
        db,
        order_store,
        tick_repo,
        broker,
        audit,
        mode != "LIVE",
    ));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    tokio::spawn(vnq_reconcile::run_sync_task(
        Arc::clone(&shared.order_store),
        Arc::clone(&shared.broker),
        vnq_reconcile::DEFAULT_SYNC_INTERVAL,
        shared.shutdown.clone(),
    ));

    if let Some(ws_url) = std::env::var("VNQ_MARKET_DATA_WS_URL").ok() {
        spawn_market_data_pipeline(ws_url, Arc::clone(&shared));
    } else {
        info!("VNQ_MARKET_DATA_WS_URL unset, market data ingest disabled");
    }

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("vnq-daemon listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = shared.shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("ctrl-c received, triggering shutdown");
        shutdown.trigger();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shared.shutdown.wait())
        .await
        .context("server crashed")?;

    Ok(())
}

fn build_broker(
    secrets: &vnq_config::secrets::ResolvedSecrets,
    mode: &str,
) -> anyhow::Result<Arc<dyn vnq_execution::BrokerAdapter>> {
    let base_url = std::env::var("VNQ_SSI_BASE_URL")
        .unwrap_or_else(|_| "https://fc-tradeapi.ssi.com.vn".to_string());

    let (Some(consumer_id), Some(consumer_secret), Some(key_path)) = (
        secrets.ssi_consumer_id.clone(),
        secrets.ssi_consumer_secret.clone(),
        secrets.ssi_private_key_path.clone(),
    ) else {
        anyhow::bail!("mode {mode} requires SSI broker credentials but none were resolved");
    };

    let private_key = load_rsa_private_key(&key_path)
        .with_context(|| format!("failed to load RSA private key from {key_path}"))?;

    Ok(Arc::new(SsiRestBroker::new(SsiRestBrokerConfig {
        base_url,
        consumer_id,
        consumer_secret,
        private_key,
    })))
}

/// Load a PEM-encoded RSA private key, trying PKCS#8 first then falling
/// back to PKCS#1 -- the original credential loader accepted either.
fn load_rsa_private_key(path: &str) -> anyhow::Result<RsaPrivateKey> {
    let pem = std::fs::read_to_string(path).with_context(|| format!("read key file {path}"))?;

    if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(&pem) {
        return Ok(key);
    }
    RsaPrivateKey::from_pkcs1_pem(&pem).context("key is neither valid PKCS#8 nor PKCS#1 PEM")
}

fn read_risk_limits(config_json: &serde_json::Value) -> RiskLimit {
    let pct = |pointer: &str, default: &str| -> Decimal {
        config_json
            .pointer(pointer)
            .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_f64().map(|f| f.to_string())))
            .and_then(|s| Decimal::from_str(&s).ok())
            .unwrap_or_else(|| Decimal::from_str(default).unwrap())
    };

    RiskLimit {
        max_position_pct: pct("/risk/max_position_pct", "0.30"),
        max_daily_loss: pct("/risk/max_daily_loss", "50000000"),
        // Fail-closed at boot regardless of config: the operator must call
        // POST /v1/killswitch/arm before any run can start.
        kill_switch_active: true,
        stop_loss_pct: pct("/risk/stop_loss_pct", "0.07"),
        take_profit_pct: pct("/risk/take_profit_pct", "0.15"),
    }
}

fn spawn_market_data_pipeline(ws_url: String, shared: Arc<state::AppState>) {
    use vnq_md::{run_flush_task, run_ingest_task, RingBuffer, DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_BUFFER_SIZE};

    let buffer = Arc::new(RingBuffer::new(DEFAULT_MAX_BUFFER_SIZE));
    let (tx, rx) = tokio::sync::mpsc::channel(1024);

    let client = Arc::new(vnq_broker::MarketDataClient::new(ws_url));
    let symbols = watchlist_symbols();

    tokio::spawn(market_data::run_market_data_task(
        client,
        symbols,
        tx,
        shared.shutdown.clone(),
    ));
    tokio::spawn(run_ingest_task(Arc::clone(&buffer), rx, shared.shutdown.clone()));

    let db = shared.db.clone();
    tokio::spawn(run_flush_task(
        buffer,
        DEFAULT_FLUSH_INTERVAL,
        shared.shutdown.clone(),
        move |batch| {
            let db = db.clone();
            async move {
                for tick in &batch {
                    if let Err(err) = vnq_db::insert_tick(&db, tick).await {
                        warn!(error = %err, symbol = %tick.symbol, "tick flush failed");
                    }
                }
                Ok(())
            }
        },
    ));
}

fn watchlist_symbols() -> Vec<vnq_schemas::Symbol> {
    std::env::var("VNQ_WATCHLIST")
        .ok()
        .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(vnq_schemas::Symbol::new).collect())
        .unwrap_or_default()
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("VNQ_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
        "http://localhost:1420",
        "http://127.0.0.1:1420",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
