//! T+2.5 settlement calendar.
//!
//! HOSE/HNX/UPCOM settle two trading days after trade date, with shares
//! becoming sellable only from the afternoon session (13:00 ICT) of the
//! settlement date onward — hence "T+2.5" rather than a clean T+2. Ported
//! from `original_source/packages/core/src/core/use_cases/settlement.py`.

use chrono::{Datelike, NaiveDate, Weekday};

/// Afternoon session cutoff, in local (Asia/Ho_Chi_Minh) hour-of-day.
pub const AFTERNOON_SESSION_HOUR: u32 = 13;

/// Vietnamese stock exchange public holidays. This table only covers the
/// years the platform has been configured for; extending it is a config
/// change, not a code change, if a richer source becomes available.
fn is_public_holiday(date: NaiveDate) -> bool {
    const HOLIDAYS_2026: &[(u32, u32)] = &[
        (1, 1),   // New Year's Day
        (2, 16),  // Tet holiday (lunar new year eve, observed)
        (2, 17),
        (2, 18),
        (2, 19),
        (2, 20),
        (4, 18),  // Hung Kings' Festival (observed)
        (4, 30),  // Reunification Day
        (5, 1),   // Labor Day
        (9, 2),   // National Day
        (9, 3),   // National Day (observed)
    ];
    if date.year() == 2026 {
        HOLIDAYS_2026.contains(&(date.month(), date.day()))
    } else {
        false
    }
}

/// A day is a trading day if it isn't a weekend and isn't a public holiday.
pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_public_holiday(date)
}

/// The next trading day strictly after `date`.
pub fn next_trading_day(date: NaiveDate) -> NaiveDate {
    let mut d = date.succ_opt().expect("date arithmetic overflow");
    while !is_trading_day(d) {
        d = d.succ_opt().expect("date arithmetic overflow");
    }
    d
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementDate {
    pub trade_date: NaiveDate,
    pub settlement_date: NaiveDate,
}

/// T+2: the settlement date is the trade date advanced by two trading days.
pub fn calculate_settlement_date(trade_date: NaiveDate) -> SettlementDate {
    let t1 = next_trading_day(trade_date);
    let t2 = next_trading_day(t1);
    SettlementDate {
        trade_date,
        settlement_date: t2,
    }
}

/// Whether shares bought on `settlement.trade_date` are sellable given the
/// current wall-clock date/hour.
///
/// - Strictly after the settlement date: always sellable.
/// - On the settlement date: sellable only from the afternoon session.
/// - Before the settlement date: never sellable.
pub fn can_sell_now(settlement: SettlementDate, current_date: NaiveDate, current_hour: u32) -> bool {
    if current_date > settlement.settlement_date {
        true
    } else if current_date == settlement.settlement_date {
        current_hour >= AFTERNOON_SESSION_HOUR
    } else {
        false
    }
}
