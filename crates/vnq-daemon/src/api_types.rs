//! Request and response types for all vnq-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vnq_schemas::{Exchange, Order, OrderType, Side};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Gate refusal (403)
// ---------------------------------------------------------------------------

/// Response body when a daemon route is refused due to a gate check failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRefusedResponse {
    pub error: String,
    /// Which gate failed: "kill_switch_armed" | "risk_allowed"
    pub gate: String,
}

// ---------------------------------------------------------------------------
// /v1/killswitch/arm  /v1/killswitch/disarm
// ---------------------------------------------------------------------------

/// Response for kill switch arm / disarm endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillSwitchResponse {
    /// true = armed (execution allowed), false = disarmed (execution blocked).
    pub armed: bool,
    /// Active run ID at the moment of the call (if any).
    pub active_run_id: Option<Uuid>,
    /// Current run-lifecycle state ("idle" | "running" | "halted").
    pub state: String,
}

// ---------------------------------------------------------------------------
// POST /v1/orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub exchange: Exchange,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: i64,
    pub limit_price: Decimal,
    pub reference_price: Decimal,
    /// Units of `symbol` already queued for sale elsewhere in the book.
    #[serde(default)]
    pub pending_sell_qty: i64,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderResponse {
    pub order: Order,
    /// "replayed" | "risk_rejected" | "submitted" | "broker_rejected"
    pub outcome: String,
}

// ---------------------------------------------------------------------------
// GET /v1/orders/open
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct OpenOrdersResponse {
    pub orders: Vec<Order>,
    pub as_of: DateTime<Utc>,
}
