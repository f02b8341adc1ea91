//! vnq-portfolio
//!
//! Position sizing, settlement-bucket rolling, and realized daily P&L
//! tracking. `Position`/`PortfolioState` themselves live in `vnq-schemas`
//! (they're shared domain data); this crate is the use-case logic that
//! operates on them.

pub mod pnl;
pub mod settlement_ledger;
pub mod sizing;

pub use pnl::DailyPnlTracker;
pub use settlement_ledger::{apply_fill, roll_forward_one_day, roll_forward_through, SettlementLedgerError};
pub use sizing::{recommend_buy_quantity, CapReason, SizingRecommendation};
