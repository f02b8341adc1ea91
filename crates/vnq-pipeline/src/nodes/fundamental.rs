//! Optional fundamental/AI-insight node. Runs narrative
//! generation and early-warning risk scoring for each top candidate;
//! unconditionally routes on to the risk node. Absent entirely when no AI
//! engine adapter is configured -- the supervisor skips straight to risk.

use std::collections::BTreeMap;

use vnq_schemas::{AgentState, EarlyWarningLevel, EarlyWarningResult as SchemaEarlyWarning};

use crate::ports::{AiEnginePort, RiskLevel};
use crate::state::PartialAgentUpdate;

fn map_level(level: RiskLevel) -> EarlyWarningLevel {
    match level {
        RiskLevel::Low => EarlyWarningLevel::Low,
        RiskLevel::Medium => EarlyWarningLevel::Medium,
        RiskLevel::High => EarlyWarningLevel::High,
        RiskLevel::Critical => EarlyWarningLevel::Critical,
    }
}

pub async fn run(state: &AgentState, ai_engine: &dyn AiEnginePort) -> anyhow::Result<PartialAgentUpdate> {
    let mut ai_insights = BTreeMap::new();
    let mut early_warning_results = BTreeMap::new();

    for symbol in &state.top_candidates {
        let narrative = ai_engine.narrative(symbol).await?;
        ai_insights.insert(symbol.as_str().to_string(), narrative);

        let warning = ai_engine.early_warning(symbol).await?;
        early_warning_results.insert(
            symbol.as_str().to_string(),
            SchemaEarlyWarning {
                symbol: symbol.clone(),
                risk_score: warning.risk_score,
                risk_level: map_level(warning.risk_level),
                alerts: warning.alerts,
            },
        );
    }

    tracing::info!(run_id = %state.run_id, assessed = state.top_candidates.len(), "fundamental node: ai insights gathered");

    Ok(PartialAgentUpdate { ai_insights, early_warning_results, ..Default::default() })
}
