//! Realized daily P&L tracker feeding `vnq-risk`'s `DAILY_LOSS_LIMIT` check.
//!
//! A thin FIFO-free running total -- Vietnamese retail accounts report
//! realized P&L per sell fill against the position's weighted average cost,
//! not per-lot FIFO lot consumption.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use vnq_risk::DailyLossState;

#[derive(Debug, Clone)]
pub struct DailyPnlTracker {
    day: NaiveDate,
    realized: Decimal,
    max_daily_loss: Decimal,
}

impl DailyPnlTracker {
    pub fn new(day: NaiveDate, max_daily_loss: Decimal) -> Self {
        Self {
            day,
            realized: Decimal::ZERO,
            max_daily_loss,
        }
    }

    /// Record a sell's realized P&L (`(fill_price - avg_cost) * qty`,
    /// negative for a loss). Resets the running total if `today` has
    /// advanced past the tracked day.
    pub fn record_realized(&mut self, today: NaiveDate, pnl: Decimal) {
        if today != self.day {
            self.day = today;
            self.realized = Decimal::ZERO;
        }
        self.realized += pnl;
    }

    pub fn realized_today(&self) -> Decimal {
        self.realized
    }

    /// Snapshot in the shape `vnq-risk::engine::validate_order` expects.
    /// Only losses count against the limit; a net-positive day always
    /// passes regardless of `max_daily_loss`.
    pub fn to_daily_loss_state(&self) -> DailyLossState {
        let loss = if self.realized < Decimal::ZERO {
            -self.realized
        } else {
            Decimal::ZERO
        };
        DailyLossState {
            realized_loss_today: loss,
            max_daily_loss: self.max_daily_loss,
        }
    }
}
