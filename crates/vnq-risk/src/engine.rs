//! The risk/compliance gate.
//!
//! Ported from `original_source/packages/core/src/core/use_cases/risk_check.py`:
//! every check runs independently and its outcome is recorded, even after an
//! earlier check has already failed, so a rejected order's reasons are
//! exhaustive rather than "stops at first failure" — the one exception is
//! `KILL_SWITCH`, which short-circuits the whole gate since every other
//! check is meaningless once trading is halted.

use rust_decimal::Decimal;

use vnq_schemas::{Order, OrderStatus, PortfolioState, RiskLimit, Side};

use crate::price_band::{calculate_price_band, validate_order_price};
use crate::types::{CheckOutcome, DailyLossState, OrderRequest, RiskCheckResult};

fn kill_switch_check(limits: &RiskLimit) -> CheckOutcome {
    CheckOutcome {
        name: "KILL_SWITCH",
        passed: !limits.kill_switch_active,
        reason: limits
            .kill_switch_active
            .then(|| "kill switch is active; all new orders are halted".to_string()),
    }
}

fn price_band_check(req: &OrderRequest) -> CheckOutcome {
    let band = calculate_price_band(req.symbol.clone(), req.exchange, req.reference_price);
    match validate_order_price(req.limit_price, &band) {
        Ok(()) => CheckOutcome {
            name: "PRICE_BAND",
            passed: true,
            reason: None,
        },
        Err(violation) => CheckOutcome {
            name: "PRICE_BAND",
            passed: false,
            reason: Some(violation.reason()),
        },
    }
}

fn lot_size_check(req: &OrderRequest) -> CheckOutcome {
    let aligned = req.quantity.is_lot_aligned();
    CheckOutcome {
        name: "LOT_SIZE",
        passed: aligned,
        reason: (!aligned).then(|| {
            format!(
                "quantity {} is not a multiple of the {} share lot size",
                req.quantity.raw(),
                vnq_schemas::LOT_SIZE
            )
        }),
    }
}

fn position_size_check(req: &OrderRequest, portfolio: &PortfolioState, limits: &RiskLimit) -> CheckOutcome {
    let nav = portfolio.net_asset_value();
    let order_value = req.limit_price.value_for(req.quantity);
    let max_allowed = nav * limits.max_position_pct;
    let passed = order_value <= max_allowed;
    CheckOutcome {
        name: "POSITION_SIZE",
        passed,
        reason: (!passed).then(|| {
            format!(
                "order value {order_value} exceeds {}% of NAV ({max_allowed})",
                limits.max_position_pct * Decimal::from(100)
            )
        }),
    }
}

fn buying_power_check(req: &OrderRequest, portfolio: &PortfolioState) -> CheckOutcome {
    if req.side != Side::Buy {
        return CheckOutcome {
            name: "BUYING_POWER",
            passed: true,
            reason: None,
        };
    }
    let order_value = req.limit_price.value_for(req.quantity);
    let passed = order_value <= portfolio.cash.purchasing_power;
    CheckOutcome {
        name: "BUYING_POWER",
        passed,
        reason: (!passed).then(|| {
            format!(
                "order value {order_value} exceeds available purchasing power {}",
                portfolio.cash.purchasing_power
            )
        }),
    }
}

fn sellable_qty_check(req: &OrderRequest, portfolio: &PortfolioState) -> CheckOutcome {
    if req.side != Side::Sell {
        return CheckOutcome {
            name: "SELLABLE_QTY",
            passed: true,
            reason: None,
        };
    }
    let available = portfolio.sellable_qty(&req.symbol) - req.pending_sell_qty;
    let passed = available >= req.quantity.raw();
    CheckOutcome {
        name: "SELLABLE_QTY",
        passed,
        reason: (!passed).then(|| {
            format!(
                "requested {} but only {available} shares are sellable (pending sells already reserve {})",
                req.quantity.raw(),
                req.pending_sell_qty
            )
        }),
    }
}

fn daily_loss_limit_check(daily_loss: &DailyLossState) -> CheckOutcome {
    let passed = daily_loss.realized_loss_today <= daily_loss.max_daily_loss;
    CheckOutcome {
        name: "DAILY_LOSS_LIMIT",
        passed,
        reason: (!passed).then(|| {
            format!(
                "realized loss today {} exceeds daily limit {}",
                daily_loss.realized_loss_today, daily_loss.max_daily_loss
            )
        }),
    }
}

/// Evaluate every risk check for a candidate order. If `KILL_SWITCH` fails,
/// every other check is reported as a trivial pass-through skip so the
/// result still enumerates all seven names, but `approved` is `false`
/// regardless.
pub fn validate_order(
    req: &OrderRequest,
    portfolio: &PortfolioState,
    limits: &RiskLimit,
    daily_loss: &DailyLossState,
) -> RiskCheckResult {
    let kill_switch = kill_switch_check(limits);
    if !kill_switch.passed {
        return RiskCheckResult {
            approved: false,
            checks: vec![kill_switch],
        };
    }

    let checks = vec![
        kill_switch,
        price_band_check(req),
        lot_size_check(req),
        position_size_check(req, portfolio, limits),
        buying_power_check(req, portfolio),
        sellable_qty_check(req, portfolio),
        daily_loss_limit_check(daily_loss),
    ];

    let approved = checks.iter().all(|c| c.passed);
    RiskCheckResult { approved, checks }
}

/// Apply a risk-gate result to a freshly created order, transitioning it to
/// `Pending` on approval or `Rejected` with a joined reason on failure.
pub fn apply_gate_result(
    order: &Order,
    result: &RiskCheckResult,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Order, vnq_schemas::InvalidTransition> {
    if result.approved {
        order.transition_to(OrderStatus::Pending, Default::default(), now)
    } else {
        order.transition_to(
            OrderStatus::Rejected,
            vnq_schemas::order::TransitionPatch {
                rejection_reason: result.rejection_summary(),
                ..Default::default()
            },
            now,
        )
    }
}
