//! Screener node: fundamentals screen + volume-spike flag,
//! capped at `max_candidates`. Grounded on `screener_agent.py`'s
//! `screen_candidates` + volume-spike detector.

use vnq_schemas::{AgentState, ScreenerResult};

use crate::ports::{ScreenerPort, TickRepoPort};
use crate::state::PartialAgentUpdate;

pub async fn run(
    state: &AgentState,
    screener: &dyn ScreenerPort,
    tick_repo: &dyn TickRepoPort,
) -> anyhow::Result<PartialAgentUpdate> {
    let candidates = screener
        .screen(screener_min_eps_growth(state), screener_max_pe_ratio(state))
        .await?;
    let spiking = tick_repo.query_volume_spikes(screener_volume_spike_threshold(state)).await?;

    let mut watchlist: Vec<ScreenerResult> = candidates
        .into_iter()
        .map(|c| ScreenerResult {
            volume_spike: spiking.contains(&c.symbol),
            symbol: c.symbol,
            eps_growth: c.eps_growth,
            pe_ratio: c.pe_ratio,
        })
        .collect();
    watchlist.truncate(state.config.max_candidates);

    tracing::info!(run_id = %state.run_id, candidates = watchlist.len(), "screener node: watchlist built");

    Ok(PartialAgentUpdate { watchlist: Some(watchlist), ..Default::default() })
}

// Default thresholds from `screener_agent.py`. Not yet exposed on
// `PipelineConfig` as tunables, so they're fixed constants here rather
// than plumbed through state.
fn screener_min_eps_growth(_state: &AgentState) -> f64 {
    0.10
}

fn screener_max_pe_ratio(_state: &AgentState) -> f64 {
    15.0
}

fn screener_volume_spike_threshold(_state: &AgentState) -> f64 {
    2.0
}
