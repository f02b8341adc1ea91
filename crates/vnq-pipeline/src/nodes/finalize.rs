//! Terminal node. Every route through the DAG ends here,
//! whether or not any trades were ultimately placed.

use vnq_schemas::{AgentPhase, AgentState};

use crate::state::PartialAgentUpdate;

pub fn run(state: &AgentState) -> PartialAgentUpdate {
    tracing::info!(
        run_id = %state.run_id,
        approved = state.approved_trades.len(),
        plans = state.execution_plans.len(),
        "finalize node: run complete"
    );
    PartialAgentUpdate::phase(AgentPhase::Completed)
}
