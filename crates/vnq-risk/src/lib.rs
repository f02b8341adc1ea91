//! vnq-risk
//!
//! Regulatory price bands, the T+2.5 settlement calendar, and the
//! risk/compliance gate that sits in front of every order placement
//!.

pub mod engine;
pub mod price_band;
pub mod settlement;
pub mod types;

pub use engine::{apply_gate_result, validate_order};
pub use price_band::{calculate_price_band, validate_order_price, PriceBand, PriceBandViolation};
pub use settlement::{
    calculate_settlement_date, can_sell_now, is_trading_day, next_trading_day, SettlementDate,
    AFTERNOON_SESSION_HOUR,
};
pub use types::{CheckOutcome, DailyLossState, OrderRequest, RiskCheckResult};
