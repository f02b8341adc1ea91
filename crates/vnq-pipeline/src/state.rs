//! Partial-update plumbing for [`vnq_schemas::AgentState`].
//!
//! The canonical scratchpad and its value types live in `vnq-schemas` since
//! they're plain data shared across crates. What belongs here is the node
//! contract: every node returns a [`PartialAgentUpdate`], and the supervisor
//! merges it additively via [`apply`] -- a node never mutates a field it
//! didn't produce.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use vnq_schemas::{
    AgentPhase, AgentState, EarlyWarningResult, ExecutionPlan, RiskAssessment, ScreenerResult,
    Symbol, TechnicalScore,
};

/// A node's contribution to [`AgentState`]. `None`/empty fields leave the
/// prior value untouched.
#[derive(Debug, Clone, Default)]
pub struct PartialAgentUpdate {
    pub phase: Option<AgentPhase>,
    pub error_message: Option<String>,
    pub watchlist: Option<Vec<ScreenerResult>>,
    pub technical_scores: Option<Vec<TechnicalScore>>,
    pub top_candidates: Option<Vec<Symbol>>,
    pub ai_insights: BTreeMap<String, String>,
    pub early_warning_results: BTreeMap<String, EarlyWarningResult>,
    pub risk_assessments: Option<Vec<RiskAssessment>>,
    pub approved_trades: Option<Vec<Symbol>>,
    pub execution_plans: Option<Vec<ExecutionPlan>>,
}

impl PartialAgentUpdate {
    pub fn phase(phase: AgentPhase) -> Self {
        Self { phase: Some(phase), ..Default::default() }
    }
}

/// Merge `update` into `state` additively: agents merge partial updates,
/// no agent mutates upstream fields.
pub fn apply(state: &mut AgentState, update: PartialAgentUpdate) {
    if let Some(v) = update.phase {
        state.phase = v;
    }
    if let Some(v) = update.error_message {
        state.error_message = Some(v);
    }
    if let Some(v) = update.watchlist {
        state.watchlist = v;
    }
    if let Some(v) = update.technical_scores {
        state.technical_scores = v;
    }
    if let Some(v) = update.top_candidates {
        state.top_candidates = v;
    }
    state.ai_insights.extend(update.ai_insights);
    state.early_warning_results.extend(update.early_warning_results);
    if let Some(v) = update.risk_assessments {
        state.risk_assessments = v;
    }
    if let Some(v) = update.approved_trades {
        state.approved_trades = v;
    }
    if let Some(v) = update.execution_plans {
        state.execution_plans = v;
    }
}

/// Stamp a fresh run's identity and defaults onto an already-constructed
/// [`AgentState`] (the `inject_context` node).
pub fn inject_context(state: &mut AgentState, now: DateTime<Utc>) {
    state.phase = AgentPhase::Screening;
    state.triggered_at = now;
    state.error_message = None;
}
