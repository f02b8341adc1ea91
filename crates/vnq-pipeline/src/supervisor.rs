//! Static DAG supervisor. Routing is plain deterministic code
//! over [`vnq_schemas::AgentState`] -- no node decides where control flows
//! next. Grounded on `supervisor.py`'s `_route_after_screener` /
//! `_route_after_technical` / `_route_after_risk` and the graph wiring in
//! its `build_graph`.

use std::sync::Arc;

use vnq_schemas::{AgentPhase, AgentState};

use crate::nodes::{executor, finalize, fundamental, risk, screener, technical};
use crate::ports::{AiEnginePort, PlaceOrderPort, ScreenerPort, TickRepoPort};
use crate::state::{apply, inject_context};

/// Holds the adapters every node calls through. `ai_engine` is optional:
/// when absent the fundamental node is skipped entirely and routing goes
/// straight from technical to risk, same as the DAG when that node was
/// never registered in the Python source's graph builder.
pub struct Supervisor {
    pub screener: Arc<dyn ScreenerPort>,
    pub tick_repo: Arc<dyn TickRepoPort>,
    pub ai_engine: Option<Arc<dyn AiEnginePort>>,
    pub place_order: Arc<dyn PlaceOrderPort>,
    pub risk_limits: vnq_schemas::RiskLimit,
}

impl Supervisor {
    /// Run one full pipeline pass over `state`, mutating it node by node and
    /// returning it once `finalize` has run.
    pub async fn run(&self, mut state: AgentState) -> anyhow::Result<AgentState> {
        inject_context(&mut state, chrono::Utc::now());

        let screener_update = screener::run(&state, self.screener.as_ref(), self.tick_repo.as_ref()).await?;
        apply(&mut state, screener_update);
        if state.watchlist.is_empty() {
            apply(&mut state, finalize::run(&state));
            return Ok(state);
        }

        let technical_update = technical::run(&state, self.tick_repo.as_ref()).await?;
        apply(&mut state, technical_update);
        if state.top_candidates.is_empty() {
            apply(&mut state, finalize::run(&state));
            return Ok(state);
        }

        if let Some(ai_engine) = &self.ai_engine {
            let fundamental_update = fundamental::run(&state, ai_engine.as_ref()).await?;
            apply(&mut state, fundamental_update);
        }

        state.phase = AgentPhase::RiskChecking;
        let risk_update = risk::run(&state, &self.risk_limits, self.tick_repo.as_ref()).await?;
        apply(&mut state, risk_update);
        if state.approved_trades.is_empty() {
            apply(&mut state, finalize::run(&state));
            return Ok(state);
        }

        state.phase = AgentPhase::Executing;
        let executor_update = executor::run(&state, self.place_order.as_ref()).await?;
        apply(&mut state, executor_update);

        apply(&mut state, finalize::run(&state));
        Ok(state)
    }
}
