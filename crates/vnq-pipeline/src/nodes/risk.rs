//! Risk-assessment node. Grounded on `risk_agent.py`: for every
//! top candidate, apply a kill-switch veto, an early-warning veto, VaR and
//! lot-rounded position sizing, a concentration check, and compute
//! stop-loss/take-profit off the latest traded price. Distinct from
//! `vnq-risk`'s pre-trade compliance gate (§4.5) -- this node decides
//! *whether to propose a trade at all and at what size*; the compliance
//! gate still runs again when the executor actually places the order.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use vnq_schemas::{AgentState, EarlyWarningLevel, Quantity, RiskAssessment};

use crate::ports::TickRepoPort;
use crate::state::PartialAgentUpdate;

/// Rough VaR fallback when no tick history supports a historical
/// calculation: 2% of NAV, matching `risk_agent.py`'s `nav * 0.02` fallback.
const VAR_FALLBACK_PCT: &str = "0.02";

/// Maximum fraction of NAV any single symbol's existing exposure plus this
/// order may represent before the concentration check vetoes a buy.
const MAX_CONCENTRATION_PCT: &str = "0.30";

pub async fn run(
    state: &AgentState,
    limits: &vnq_schemas::RiskLimit,
    tick_repo: &dyn TickRepoPort,
) -> anyhow::Result<PartialAgentUpdate> {
    let mut assessments = Vec::with_capacity(state.top_candidates.len());
    let mut approved_trades = Vec::new();

    for symbol in &state.top_candidates {
        if limits.kill_switch_active {
            assessments.push(rejected(symbol.clone(), "kill switch is active; all new trades are halted".to_string()));
            continue;
        }

        if let Some(warning) = state.early_warning_results.get(symbol.as_str()) {
            if warning.risk_level == EarlyWarningLevel::Critical {
                let summary = if warning.alerts.is_empty() {
                    "critical early-warning risk level".to_string()
                } else {
                    format!("critical early-warning risk level: {}", warning.alerts.join("; "))
                };
                assessments.push(rejected(symbol.clone(), summary));
                continue;
            }
        }

        let latest_price = tick_repo.get_latest_price(symbol).await?;
        if latest_price <= Decimal::ZERO {
            assessments.push(rejected(symbol.clone(), "no usable latest price".to_string()));
            continue;
        }

        let var_95 = match tick_repo.calculate_var_historical(symbol, 0.95, 252).await {
            Ok(v) if v > Decimal::ZERO => v,
            _ => state.portfolio.nav * VAR_FALLBACK_PCT.parse::<Decimal>().unwrap(),
        };

        let purchasing_power = state.portfolio.purchasing_power;
        let nav = state.portfolio.nav;
        let max_position_value = (nav * limits.max_position_pct).min(purchasing_power);
        let raw_shares = (max_position_value / latest_price).floor().to_i64().unwrap_or(0);
        let quantity = Quantity::round_down_to_lot(raw_shares);
        let actual_value = latest_price * Decimal::from(quantity.raw());
        let position_pct = if nav > Decimal::ZERO { actual_value / nav } else { Decimal::ZERO };

        if quantity.raw() <= 0 {
            assessments.push(rejected(symbol.clone(), "computed position size rounds down to zero lots".to_string()));
            continue;
        }

        if position_pct > limits.max_position_pct {
            assessments.push(rejected(
                symbol.clone(),
                format!("position size {position_pct} exceeds max_position_pct {}", limits.max_position_pct),
            ));
            continue;
        }

        let existing_qty = state.portfolio.positions.get(symbol.as_str()).copied().unwrap_or(0);
        if existing_qty > 0 && nav > Decimal::ZERO {
            // Concentration is evaluated against actual market exposure
            // (existing_qty * latest_price), not a flat per-share constant --
            // a deliberate correction of the Python source's `existing_qty *
            // 100` placeholder proxy, recorded as an Open Question decision.
            let current_exposure = Decimal::from(existing_qty) * latest_price;
            let concentration = current_exposure / nav;
            let max_concentration: Decimal = MAX_CONCENTRATION_PCT.parse().unwrap();
            if concentration > max_concentration {
                assessments.push(rejected(
                    symbol.clone(),
                    format!("existing exposure {concentration} of NAV exceeds concentration limit {max_concentration}"),
                ));
                continue;
            }
        }

        let stop_loss_price = latest_price * (Decimal::ONE - limits.stop_loss_pct);
        let take_profit_price = latest_price * (Decimal::ONE + limits.take_profit_pct);

        tracing::debug!(symbol = %symbol, %var_95, "risk node: var_95 computed");
        approved_trades.push(symbol.clone());
        assessments.push(RiskAssessment {
            symbol: symbol.clone(),
            approved: true,
            position_size_pct: position_pct,
            latest_price,
            stop_loss_price,
            take_profit_price,
            rejection_reason: None,
        });
    }

    tracing::info!(
        run_id = %state.run_id,
        assessed = assessments.len(),
        approved = approved_trades.len(),
        "risk node: assessment complete"
    );

    Ok(PartialAgentUpdate {
        risk_assessments: Some(assessments),
        approved_trades: Some(approved_trades),
        ..Default::default()
    })
}

fn rejected(symbol: vnq_schemas::Symbol, reason: String) -> RiskAssessment {
    RiskAssessment {
        symbol,
        approved: false,
        position_size_pct: Decimal::ZERO,
        latest_price: Decimal::ZERO,
        stop_loss_price: Decimal::ZERO,
        take_profit_price: Decimal::ZERO,
        rejection_reason: Some(reason),
    }
}
