//! Portfolio-side entities: Position, CashBalance, PortfolioState, RiskLimit.
//!
//! All of these are authoritative only as sourced from the broker — this
//! crate defines the shapes; `vnq-reconcile` owns convergence.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::{Price, Symbol};

/// A held position in one symbol. T+2-settlement-aware: `sellable_qty` is
/// the portion that has cleared settlement; `receiving_t1`/`receiving_t2`
/// are still in transit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: i64,
    pub sellable_qty: i64,
    pub receiving_t1: i64,
    pub receiving_t2: i64,
    pub avg_price: Price,
    pub market_price: Price,
}

impl Position {
    /// `true` iff the settlement-bucket invariant holds:
    /// `quantity == sellable_qty + receiving_t1 + receiving_t2`.
    pub fn is_consistent(&self) -> bool {
        self.sellable_qty <= self.quantity
            && self.quantity == self.sellable_qty + self.receiving_t1 + self.receiving_t2
    }

    pub fn market_value(&self) -> Decimal {
        self.market_price.raw() * Decimal::from(self.quantity)
    }
}

/// Cash side of the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashBalance {
    /// Settled cash. Withdrawals are validated against this.
    pub cash_bal: Decimal,
    /// Buying capital including any margin. Buys are validated against this.
    pub purchasing_power: Decimal,
    /// Cash tied up in unsettled sell proceeds.
    pub pending_settlement: Decimal,
}

/// The whole-portfolio snapshot. Always sourced from the broker; never
/// locally recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub positions: Vec<Position>,
    pub cash: CashBalance,
    pub synced_at: DateTime<Utc>,
}

impl PortfolioState {
    /// Net asset value = sum(market_value) + cash_bal.
    pub fn net_asset_value(&self) -> Decimal {
        let positions_value: Decimal = self.positions.iter().map(Position::market_value).sum();
        positions_value + self.cash.cash_bal
    }

    pub fn position(&self, symbol: &Symbol) -> Option<&Position> {
        self.positions.iter().find(|p| &p.symbol == symbol)
    }

    /// Sellable quantity for a symbol, 0 if no position is held.
    pub fn sellable_qty(&self, symbol: &Symbol) -> i64 {
        self.position(symbol).map(|p| p.sellable_qty).unwrap_or(0)
    }
}

/// Risk policy limits (operator-configured, not regulatory).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimit {
    /// Maximum fraction of NAV a single order may represent.
    pub max_position_pct: Decimal,
    pub max_daily_loss: Decimal,
    pub kill_switch_active: bool,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
}
