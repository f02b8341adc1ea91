//! Position sizing calculator.
//!
//! Derives a target trade size from available capital and constraint
//! limits, using `rust_decimal::Decimal` money and lot-aligned Vietnamese
//! share quantities throughout. Used by the Risk agent (`vnq-pipeline`) to
//! propose a quantity before the order reaches the risk gate in
//! `vnq-risk`, not as a substitute for that gate -- the gate is
//! authoritative and re-checks everything this module recommends.

use rust_decimal::Decimal;

use vnq_schemas::{PortfolioState, Price, Quantity, RiskLimit, Symbol};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizingRecommendation {
    pub symbol: Symbol,
    pub quantity: Quantity,
    pub capped_by: CapReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapReason {
    /// The full requested notional fit within both limits.
    None,
    /// `max_position_pct` of NAV was the binding constraint.
    PositionSizeLimit,
    /// Available purchasing power was the binding constraint.
    PurchasingPower,
}

/// Recommend a lot-aligned buy quantity for `symbol` at `price`, the
/// largest quantity that satisfies both the position-size limit and
/// purchasing power, rounded down to a whole lot.
///
/// Returns `Quantity::new(0)` if even one lot cannot be afforded within the
/// position-size limit.
pub fn recommend_buy_quantity(
    symbol: &Symbol,
    price: Price,
    portfolio: &PortfolioState,
    limits: &RiskLimit,
) -> SizingRecommendation {
    let nav = portfolio.net_asset_value();
    let max_notional_by_position = nav * limits.max_position_pct;
    let max_notional_by_cash = portfolio.cash.purchasing_power;

    let (max_notional, capped_by) = if max_notional_by_position <= max_notional_by_cash {
        (max_notional_by_position, CapReason::PositionSizeLimit)
    } else {
        (max_notional_by_cash, CapReason::PurchasingPower)
    };

    let raw_price = price.raw();
    if raw_price <= Decimal::ZERO || max_notional <= Decimal::ZERO {
        return SizingRecommendation {
            symbol: symbol.clone(),
            quantity: Quantity::new(0),
            capped_by,
        };
    }

    let raw_shares: i64 = (max_notional / raw_price)
        .trunc()
        .to_string()
        .parse()
        .unwrap_or(0);
    let lots = Quantity::round_down_to_lot(raw_shares);

    SizingRecommendation {
        symbol: symbol.clone(),
        quantity: lots,
        capped_by,
    }
}
