//! Executor node. Grounded on `executor_agent.py`: turns each
//! approved risk assessment into an [`ExecutionPlan`], lot-rounding
//! quantity from NAV * position_size_pct / latest_price. `dry_run` builds
//! the plan without touching the broker; live mode calls through
//! [`PlaceOrderPort`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use vnq_schemas::{AgentState, ExecutionPlan, Quantity, RiskAssessment, Side, SignalAction};

use crate::ports::PlaceOrderPort;
use crate::state::PartialAgentUpdate;

pub async fn run(state: &AgentState, place_order: &dyn PlaceOrderPort) -> anyhow::Result<PartialAgentUpdate> {
    let mut plans = Vec::with_capacity(state.approved_trades.len());

    for symbol in &state.approved_trades {
        let Some(assessment) = state.risk_assessments.iter().find(|a| &a.symbol == symbol) else {
            continue;
        };
        if !assessment.approved {
            continue;
        }

        let Some(score) = state.technical_scores.iter().find(|s| &s.symbol == symbol) else {
            continue;
        };
        let action = score.recommended_action;
        if matches!(action, SignalAction::Hold | SignalAction::Skip) {
            continue;
        }

        let quantity = sized_quantity(assessment, state.portfolio.nav);
        if quantity.raw() <= 0 || assessment.latest_price <= Decimal::ZERO {
            continue;
        }

        let idempotency_key = format!("{}:{}:{:?}", state.run_id, symbol, action);

        if state.config.dry_run {
            plans.push(ExecutionPlan {
                symbol: symbol.clone(),
                action,
                quantity: quantity.raw(),
                price: assessment.latest_price,
                order_type: "LO".to_string(),
                executed: false,
                order_id: None,
            });
            continue;
        }

        let side = match action {
            SignalAction::Buy => Side::Buy,
            SignalAction::Sell => Side::Sell,
            SignalAction::Hold | SignalAction::Skip => unreachable!("filtered above"),
        };

        let order_id = place_order
            .place(symbol, side, quantity.raw(), assessment.latest_price, &idempotency_key)
            .await?;

        plans.push(ExecutionPlan {
            symbol: symbol.clone(),
            action,
            quantity: quantity.raw(),
            price: assessment.latest_price,
            order_type: "LO".to_string(),
            executed: order_id.is_some(),
            order_id,
        });
    }

    tracing::info!(run_id = %state.run_id, plans = plans.len(), dry_run = state.config.dry_run, "executor node: plans built");

    Ok(PartialAgentUpdate { execution_plans: Some(plans), ..Default::default() })
}

fn sized_quantity(assessment: &RiskAssessment, nav: Decimal) -> Quantity {
    let target_value = nav * assessment.position_size_pct;
    let raw_shares = (target_value / assessment.latest_price).floor().to_i64().unwrap_or(0);
    Quantity::round_down_to_lot(raw_shares)
}
