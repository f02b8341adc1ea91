//! Shared scratchpad for the multi-agent decision pipeline.
//!
//! Modeled on `original_source/packages/agents/src/agents/state.py`'s
//! `AgentState` TypedDict: one shared record agents merge partial updates
//! into. In Rust this is a plain struct with `Option`/`Vec` fields that
//! start empty and are filled in as the pipeline progresses; each node
//! returns a `PartialAgentUpdate` that the supervisor applies additively
//! (see `vnq-pipeline::supervisor`).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::Symbol;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentPhase {
    Idle,
    Screening,
    Analyzing,
    RiskChecking,
    Executing,
    Completed,
    Error,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EarlyWarningLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenerResult {
    pub symbol: Symbol,
    pub eps_growth: f64,
    pub pe_ratio: f64,
    pub volume_spike: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalScore {
    pub symbol: Symbol,
    pub rsi_14: f64,
    pub macd_signal: String,
    pub bb_position: String,
    pub trend_ma: String,
    pub composite_score: f64,
    pub recommended_action: SignalAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyWarningResult {
    pub symbol: Symbol,
    pub risk_score: f64,
    pub risk_level: EarlyWarningLevel,
    pub alerts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub symbol: Symbol,
    pub approved: bool,
    pub position_size_pct: Decimal,
    /// Actual current market price — never the request price — so
    /// downstream sizing is correct.
    pub latest_price: Decimal,
    pub stop_loss_price: Decimal,
    pub take_profit_price: Decimal,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub symbol: Symbol,
    pub action: SignalAction,
    pub quantity: i64,
    pub price: Decimal,
    pub order_type: String,
    pub executed: bool,
    pub order_id: Option<String>,
}

/// Pipeline-wide configuration, carried through every node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub max_candidates: usize,
    pub score_threshold: f64,
    pub dry_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_candidates: 10,
            score_threshold: 5.0,
            dry_run: true,
        }
    }
}

/// Portfolio context snapshotted at pipeline start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioContext {
    pub nav: Decimal,
    pub positions: BTreeMap<String, i64>,
    pub purchasing_power: Decimal,
}

/// The full shared pipeline state. Agents read upstream fields and append
/// to their own; no agent mutates a field owned by an earlier node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub phase: AgentPhase,
    pub run_id: String,
    pub triggered_at: DateTime<Utc>,
    pub error_message: Option<String>,

    pub watchlist: Vec<ScreenerResult>,
    pub technical_scores: Vec<TechnicalScore>,
    pub top_candidates: Vec<Symbol>,
    pub ai_insights: BTreeMap<String, String>,
    pub early_warning_results: BTreeMap<String, EarlyWarningResult>,
    pub risk_assessments: Vec<RiskAssessment>,
    pub approved_trades: Vec<Symbol>,
    pub execution_plans: Vec<ExecutionPlan>,

    pub portfolio: PortfolioContext,
    pub config: PipelineConfig,
}

impl AgentState {
    pub fn new(run_id: impl Into<String>, portfolio: PortfolioContext, config: PipelineConfig) -> Self {
        Self {
            phase: AgentPhase::Idle,
            run_id: run_id.into(),
            triggered_at: Utc::now(),
            error_message: None,
            watchlist: Vec::new(),
            technical_scores: Vec::new(),
            top_candidates: Vec::new(),
            ai_insights: BTreeMap::new(),
            early_warning_results: BTreeMap::new(),
            risk_assessments: Vec::new(),
            approved_trades: Vec::new(),
            execution_plans: Vec::new(),
            portfolio,
            config,
        }
    }
}
