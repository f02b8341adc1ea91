//! Settlement-bucket ledger: rolls a filled buy through `receiving_t2` ->
//! `receiving_t1` -> `sellable_qty` as trading days pass, and debits
//! `sellable_qty` on a sell fill.
//!
//! Validate on append, expose only a narrow write surface, applied to the
//! VN T+2.5 settlement model from `vnq-risk::settlement`.

use chrono::NaiveDate;
use thiserror::Error;

use vnq_schemas::{Position, Price, Side};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettlementLedgerError {
    #[error("fill quantity must be positive, got {0}")]
    NonPositiveQty(i64),
    #[error("sell quantity {requested} exceeds sellable balance {sellable}")]
    InsufficientSellable { requested: i64, sellable: i64 },
}

/// Apply a buy fill: the new shares land in `receiving_t2` (today's trade,
/// nothing has rolled forward yet).
pub fn apply_buy_fill(position: &mut Position, qty: i64, fill_price: Price) -> Result<(), SettlementLedgerError> {
    if qty <= 0 {
        return Err(SettlementLedgerError::NonPositiveQty(qty));
    }
    let prior_qty = position.quantity;
    let new_avg = ((position.avg_price.raw() * rust_decimal::Decimal::from(prior_qty))
        + (fill_price.raw() * rust_decimal::Decimal::from(qty)))
        / rust_decimal::Decimal::from(prior_qty + qty);

    position.quantity += qty;
    position.receiving_t2 += qty;
    position.avg_price = Price::new(new_avg);
    Ok(())
}

/// Apply a sell fill: debits from `sellable_qty` only; never touches
/// in-transit buckets. Caller (the risk gate) is responsible for ensuring
/// `qty <= sellable_qty` before the order reaches here, but this function
/// re-checks rather than trusting that.
pub fn apply_sell_fill(position: &mut Position, qty: i64) -> Result<(), SettlementLedgerError> {
    if qty <= 0 {
        return Err(SettlementLedgerError::NonPositiveQty(qty));
    }
    if qty > position.sellable_qty {
        return Err(SettlementLedgerError::InsufficientSellable {
            requested: qty,
            sellable: position.sellable_qty,
        });
    }
    position.quantity -= qty;
    position.sellable_qty -= qty;
    Ok(())
}

/// Dispatch to buy/sell based on `side` -- the only entry point
/// `vnq-execution`'s fill handler should call.
pub fn apply_fill(
    position: &mut Position,
    side: Side,
    qty: i64,
    fill_price: Price,
) -> Result<(), SettlementLedgerError> {
    match side {
        Side::Buy => apply_buy_fill(position, qty, fill_price),
        Side::Sell => apply_sell_fill(position, qty),
    }
}

/// Roll settlement buckets forward by one trading day: T+2 receipts become
/// T+1, T+1 receipts become sellable. Called once per trading-day rollover
/// by the composition root, keyed off `vnq-risk::settlement::is_trading_day`.
pub fn roll_forward_one_day(position: &mut Position) {
    position.sellable_qty += position.receiving_t1;
    position.receiving_t1 = position.receiving_t2;
    position.receiving_t2 = 0;
}

/// Convenience: roll a position forward across every trading day strictly
/// between `from` (exclusive) and `to` (inclusive).
pub fn roll_forward_through(position: &mut Position, from: NaiveDate, to: NaiveDate) {
    let mut day = from;
    while day < to {
        day = vnq_risk::next_trading_day(day);
        roll_forward_one_day(position);
    }
}
