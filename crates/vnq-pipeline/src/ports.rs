//! Ports the pipeline nodes call through. Keeping these as traits lets
//! `vnq-pipeline` stay ignorant of `vnq-db`/`vnq-broker`/any AI vendor SDK --
//! the daemon wires concrete adapters in at composition time.

use std::collections::HashSet;

use async_trait::async_trait;
use rust_decimal::Decimal;

use vnq_schemas::{Side, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone)]
pub struct EarlyWarningAssessment {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub alerts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ScreenerCandidate {
    pub symbol: Symbol,
    pub eps_growth: f64,
    pub pe_ratio: f64,
}

/// Fundamentals screen for the screener node. Grounded on
/// `screener_agent.py`'s `screen_candidates`.
#[async_trait]
pub trait ScreenerPort: Send + Sync {
    async fn screen(&self, min_eps_growth: f64, max_pe_ratio: f64) -> anyhow::Result<Vec<ScreenerCandidate>>;
}

#[derive(Debug, Clone, Copy)]
pub struct OhlcvBar {
    pub close: f64,
}

/// Tick/bar history and risk-statistics queries. Grounded on
/// `technical_agent.py` (OHLCV fetch) and `risk_agent.py` (VaR, latest price).
#[async_trait]
pub trait TickRepoPort: Send + Sync {
    async fn get_ohlcv(&self, symbol: &Symbol, days: u32) -> anyhow::Result<Vec<OhlcvBar>>;

    /// Symbols whose recent volume exceeds their rolling average by
    /// `threshold_multiplier`. Grounded on `screener_agent.py`'s volume-spike
    /// detector.
    async fn query_volume_spikes(&self, threshold_multiplier: f64) -> anyhow::Result<HashSet<Symbol>>;

    async fn get_latest_price(&self, symbol: &Symbol) -> anyhow::Result<Decimal>;

    async fn calculate_var_historical(&self, symbol: &Symbol, confidence: f64, window_days: u32) -> anyhow::Result<Decimal>;
}

/// Narrative summaries and early-warning risk scoring. The Python source
/// calls out to an LLM for these; here they're an adapter seam so the
/// pipeline itself never depends on a model vendor's SDK.
#[async_trait]
pub trait AiEnginePort: Send + Sync {
    async fn narrative(&self, symbol: &Symbol) -> anyhow::Result<String>;
    async fn early_warning(&self, symbol: &Symbol) -> anyhow::Result<EarlyWarningAssessment>;
}

/// Order placement seam for the executor node. Returns the accepted
/// broker order id, or `None` when the placement was deduped against an
/// existing idempotency key.
#[async_trait]
pub trait PlaceOrderPort: Send + Sync {
    async fn place(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: i64,
        limit_price: Decimal,
        idempotency_key: &str,
    ) -> anyhow::Result<Option<String>>;
}
