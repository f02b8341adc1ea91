//! Shared request/result types for the risk gate.

use rust_decimal::Decimal;

use vnq_schemas::{Exchange, Price, Quantity, Side, Symbol};

/// Everything the risk gate needs to evaluate a candidate order. Built by
/// the caller (execution use case) from the order draft plus current
/// market/portfolio context; the gate itself never reaches out to fetch
/// anything.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub exchange: Exchange,
    pub side: Side,
    pub quantity: Quantity,
    pub limit_price: Price,
    /// Last reference price used to derive the price band (previous
    /// session's close).
    pub reference_price: Price,
    /// Sell-side quantity already resting in other open orders for this
    /// symbol, which must be subtracted from sellable inventory so the same
    /// shares can't back two orders at once.
    pub pending_sell_qty: i64,
}

/// A single named check outcome, ordered by a fixed check name list
/// (`KILL_SWITCH`, `PRICE_BAND`, `LOT_SIZE`, `POSITION_SIZE`,
/// `BUYING_POWER`, `SELLABLE_QTY`, `DAILY_LOSS_LIMIT`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub passed: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskCheckResult {
    pub approved: bool,
    pub checks: Vec<CheckOutcome>,
}

impl RiskCheckResult {
    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Joined reasons from every failed check, for surfacing on a rejected
    /// order's `rejection_reason` field.
    pub fn rejection_summary(&self) -> Option<String> {
        let reasons: Vec<&str> = self
            .failed_checks()
            .filter_map(|c| c.reason.as_deref())
            .collect();
        if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("; "))
        }
    }
}

/// Daily realized-loss tracking input. `DAILY_LOSS_LIMIT` is evaluated
/// against this, independent of the specific order under review.
#[derive(Debug, Clone, Copy)]
pub struct DailyLossState {
    pub realized_loss_today: Decimal,
    pub max_daily_loss: Decimal,
}
