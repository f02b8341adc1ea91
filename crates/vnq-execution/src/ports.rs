//! The ports `place_order` depends on. Adapters (`vnq-db`, `vnq-broker`)
//! implement these traits; this crate never depends on them, keeping the
//! broker gateway as the sole choke-point for order flow.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vnq_schemas::Order;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_idempotency_key(&self, key: &str) -> anyhow::Result<Option<Order>>;
    /// Insert `order`, keyed uniquely by `order.idempotency_key`. Returns
    /// `true` if this call won the insert and `false` if a row with the
    /// same key already existed and nothing was written -- the conflict
    /// signal `place_order` relies on to collapse a concurrent race onto a
    /// single winner instead of propagating a raw unique-violation.
    async fn insert(&self, order: &Order) -> anyhow::Result<bool>;
    async fn update(&self, order: &Order) -> anyhow::Result<()>;
    /// All orders not yet in a terminal status -- the synchronizer's
    /// candidate set for every reconcile tick.
    async fn find_open_orders(&self) -> anyhow::Result<Vec<Order>>;
}

#[derive(Debug, Clone)]
pub struct BrokerAck {
    pub broker_order_id: String,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("broker rejected order: {reason}")]
pub struct BrokerRejected {
    pub reason: String,
}

/// Broker-reported status for a single order, ahead of mapping to the
/// local FSM. `raw` is kept for logging when the mapping table produces an
/// unexpected result.
#[derive(Debug, Clone)]
pub struct BrokerOrderStatus {
    pub broker_order_id: String,
    pub raw_status: String,
    pub filled_quantity: i64,
    pub avg_fill_price: Option<rust_decimal::Decimal>,
}

#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    async fn place_order(&self, order: &Order) -> Result<BrokerAck, BrokerRejected>;
    async fn cancel_order(&self, broker_order_id: &str) -> anyhow::Result<()>;
    async fn get_order_status(&self, broker_order_id: &str) -> anyhow::Result<BrokerOrderStatus>;
    async fn get_open_orders(&self, symbol: Option<&str>) -> anyhow::Result<Vec<BrokerOrderStatus>>;
}

/// Why an order reached the outcome it did, carried across the port
/// boundary so an adapter can shape its own audit row without this crate
/// depending on `vnq-db`'s event-type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Submitted,
    RiskRejected,
    BrokerRejected,
}

/// One `place_order` decision worth recording. Deliberately narrower than
/// `vnq-db::audit::AuditEvent` -- the adapter on the other side of this
/// port owns the storage shape (run_id, checks_passed/failed, payload);
/// this crate only hands over what it actually knows.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub order_id: String,
    pub idempotency_key: String,
    pub outcome: AuditOutcome,
    pub rejection_reason: Option<String>,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord) -> anyhow::Result<()>;
}
