//! Technical-analysis node. Scores every watchlist symbol and
//! keeps the ones whose `|composite_score|` clears `config.score_threshold`
//! as `top_candidates`. Grounded on `technical_agent.py`.

use vnq_schemas::{AgentState, TechnicalScore};

use crate::indicators::{score_from_indicators, BbPosition, MacdSignal, TrendMa};
use crate::ports::TickRepoPort;
use crate::state::PartialAgentUpdate;

const OHLCV_LOOKBACK_DAYS: u32 = 250;

fn macd_label(s: MacdSignal) -> &'static str {
    match s {
        MacdSignal::BullishCross => "bullish_cross",
        MacdSignal::BearishCross => "bearish_cross",
        MacdSignal::Neutral => "neutral",
    }
}

fn bb_label(s: BbPosition) -> &'static str {
    match s {
        BbPosition::BelowLower => "below_lower",
        BbPosition::AboveUpper => "above_upper",
        BbPosition::Inside => "inside",
    }
}

fn trend_label(s: TrendMa) -> &'static str {
    match s {
        TrendMa::GoldenCross => "golden_cross",
        TrendMa::DeathCross => "death_cross",
        TrendMa::Neutral => "neutral",
    }
}

pub async fn run(state: &AgentState, tick_repo: &dyn TickRepoPort) -> anyhow::Result<PartialAgentUpdate> {
    let mut scores = Vec::with_capacity(state.watchlist.len());
    let mut top_candidates = Vec::new();

    for entry in &state.watchlist {
        let bars = tick_repo.get_ohlcv(&entry.symbol, OHLCV_LOOKBACK_DAYS).await?;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let result = score_from_indicators(&closes);

        if result.composite_score.abs() >= state.config.score_threshold {
            top_candidates.push(entry.symbol.clone());
        }

        scores.push(TechnicalScore {
            symbol: entry.symbol.clone(),
            rsi_14: result.rsi_14,
            macd_signal: macd_label(result.macd_signal).to_string(),
            bb_position: bb_label(result.bb_position).to_string(),
            trend_ma: trend_label(result.trend_ma).to_string(),
            composite_score: result.composite_score,
            recommended_action: result.recommended_action,
        });
    }

    tracing::info!(
        run_id = %state.run_id,
        scored = scores.len(),
        top_candidates = top_candidates.len(),
        "technical node: scoring complete"
    );

    Ok(PartialAgentUpdate {
        technical_scores: Some(scores),
        top_candidates: Some(top_candidates),
        ..Default::default()
    })
}
