//! Resilient WebSocket market-data client.
//!
//! State machine and reconnect-with-backoff loop ported from
//! `original_source/packages/adapters/src/adapters/ssi/market_ws.py`'s
//! `SSIMarketWebSocket`: five states (`DISCONNECTED`, `CONNECTING`,
//! `CONNECTED`, `RECONNECTING`, `FATAL`), subscriptions replayed after every
//! reconnect, and tick parsing that tolerates either PascalCase or
//! lowercase field names from the upstream feed.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;

use vnq_resilience::RetryPolicy;
use vnq_schemas::{Exchange, Price, Symbol, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Fatal,
}

pub struct MarketDataClient {
    url: String,
    state: Mutex<ConnectionState>,
    subscribed: Mutex<Vec<Symbol>>,
    reconnect_attempt: AtomicU32,
    retry_policy: RetryPolicy,
}

impl MarketDataClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: Mutex::new(ConnectionState::Disconnected),
            subscribed: Mutex::new(Vec::new()),
            reconnect_attempt: AtomicU32::new(0),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn set_state(&self, next: ConnectionState) {
        *self.state.lock().unwrap() = next;
    }

    pub fn record_subscription(&self, symbols: Vec<Symbol>) {
        *self.subscribed.lock().unwrap() = symbols;
    }

    pub fn subscribed_symbols(&self) -> Vec<Symbol> {
        self.subscribed.lock().unwrap().clone()
    }

    /// Called by the composition root on a successful handshake.
    pub fn mark_connected(&self) {
        self.set_state(ConnectionState::Connected);
        self.reconnect_attempt.store(0, Ordering::SeqCst);
    }

    /// Called when the socket drops or a read errors; moves to
    /// `Reconnecting` and returns the delay to wait before the next attempt.
    pub fn on_disconnect(&self) -> std::time::Duration {
        self.set_state(ConnectionState::Reconnecting);
        let attempt = self.reconnect_attempt.fetch_add(1, Ordering::SeqCst);
        self.retry_policy.delay(attempt)
    }

    /// Terminal failure -- operator intervention required (e.g. revoked
    /// credentials). No further automatic reconnects will be attempted.
    pub fn mark_fatal(&self) {
        self.set_state(ConnectionState::Fatal);
    }

    pub fn mark_connecting(&self) {
        self.set_state(ConnectionState::Connecting);
    }
}

/// Parse a raw WebSocket text message into a [`Tick`]. Tolerates both the
/// feed's PascalCase field names and a lowercase fallback. Returns `None`
/// (logged) rather than an error -- one malformed tick must not tear down
/// the stream.
pub fn parse_tick_message(raw: &str) -> Option<Tick> {
    let value: Value = serde_json::from_str(raw).ok()?;

    let symbol = value
        .get("Symbol")
        .or_else(|| value.get("symbol"))
        .and_then(Value::as_str)?;

    let price_raw = value
        .get("LastPrice")
        .or_else(|| value.get("price"))?;
    let price = match price_raw {
        Value::String(s) => s.parse::<Decimal>().ok()?,
        Value::Number(n) => n.to_string().parse::<Decimal>().ok()?,
        _ => return None,
    };

    let volume = value
        .get("LastVol")
        .or_else(|| value.get("volume"))
        .and_then(Value::as_i64)?;

    let exchange_str = value
        .get("Exchange")
        .or_else(|| value.get("exchange"))
        .and_then(Value::as_str)
        .unwrap_or("HOSE");
    let exchange = match exchange_str {
        "HNX" => Exchange::Hnx,
        "UPCOM" => Exchange::Upcom,
        _ => Exchange::Hose,
    };

    Tick::new(Symbol::new(symbol), Price::new(price), volume, exchange, Utc::now()).ok()
}
