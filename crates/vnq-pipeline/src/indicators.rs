//! Technical indicator math for the technical-analysis node.
//!
//! Ported from `original_source/packages/agents/src/agents/technical_agent.py`'s
//! simple-moving-average fallback path (`_simple_rsi`, `_score_from_indicators`):
//! no external TA library is pulled in, the indicators are computed directly
//! over closing prices. All of this is statistical scoring, not a money
//! value, so `f64` is appropriate here unlike the rest of the crate graph.

use vnq_schemas::SignalAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdSignal {
    BullishCross,
    BearishCross,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BbPosition {
    BelowLower,
    AboveUpper,
    Inside,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendMa {
    GoldenCross,
    DeathCross,
    Neutral,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreResult {
    pub rsi_14: f64,
    pub macd_signal: MacdSignal,
    pub bb_position: BbPosition,
    pub trend_ma: TrendMa,
    pub composite_score: f64,
    pub recommended_action: SignalAction,
}

const MIN_BARS: usize = 2;

/// Simple (non-exponential) rolling-average RSI, matching `_simple_rsi`.
pub fn rsi_14(closes: &[f64], period: usize) -> f64 {
    if closes.len() < period + 1 {
        return 50.0;
    }
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let window = &deltas[deltas.len() - period..];
    let gains: f64 = window.iter().filter(|&&d| d > 0.0).sum::<f64>() / period as f64;
    let losses: f64 = window.iter().filter(|&&d| d < 0.0).map(|d| -d).sum::<f64>() / period as f64;
    if losses == 0.0 {
        return 100.0;
    }
    let rs = gains / losses;
    100.0 - (100.0 / (1.0 + rs))
}

/// Exponential moving average series, one value per input close (the first
/// `period - 1` values are seeded with a simple average of what's available).
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = values[0];
    out.push(prev);
    for &v in &values[1..] {
        prev = v * k + prev * (1.0 - k);
        out.push(prev);
    }
    out
}

pub fn sma(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Returns (macd_latest, signal_latest, macd_prev, signal_prev) for
/// crossover detection against MACD(12,26,9).
fn macd(closes: &[f64]) -> Option<(f64, f64, f64, f64)> {
    if closes.len() < 27 {
        return None;
    }
    let ema12 = ema(closes, 12);
    let ema26 = ema(closes, 26);
    let macd_line: Vec<f64> = ema12.iter().zip(ema26.iter()).map(|(a, b)| a - b).collect();
    let signal_line = ema(&macd_line, 9);
    let n = macd_line.len();
    if n < 2 || signal_line.len() < 2 {
        return None;
    }
    Some((macd_line[n - 1], signal_line[n - 1], macd_line[n - 2], signal_line[n - 2]))
}

fn bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<(f64, f64)> {
    let mean = sma(closes, period)?;
    let window = &closes[closes.len() - period..];
    let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / period as f64;
    let std = variance.sqrt();
    Some((mean - num_std * std, mean + num_std * std))
}

/// The full composite technical score for the technical-analysis node. Falls
/// back to a neutral reading when fewer than two bars are available, as the
/// Python source does.
pub fn score_from_indicators(closes: &[f64]) -> ScoreResult {
    if closes.len() < MIN_BARS {
        return ScoreResult {
            rsi_14: 50.0,
            macd_signal: MacdSignal::Neutral,
            bb_position: BbPosition::Inside,
            trend_ma: TrendMa::Neutral,
            composite_score: 0.0,
            recommended_action: SignalAction::Hold,
        };
    }

    let rsi = rsi_14(closes, 14);
    let mut score = 0.0;
    if rsi < 30.0 {
        score += 3.0;
    } else if rsi < 40.0 {
        score += 1.5;
    } else if rsi > 70.0 {
        score -= 3.0;
    } else if rsi > 60.0 {
        score -= 1.5;
    }

    let macd_signal = match macd(closes) {
        Some((macd_now, signal_now, macd_prev, signal_prev)) => {
            if macd_now > signal_now && macd_prev <= signal_prev {
                score += 3.0;
                MacdSignal::BullishCross
            } else if macd_now < signal_now && macd_prev >= signal_prev {
                score -= 3.0;
                MacdSignal::BearishCross
            } else {
                MacdSignal::Neutral
            }
        }
        None => MacdSignal::Neutral,
    };

    let last_close = *closes.last().unwrap();
    let bb_position = match bollinger(closes, 20, 2.0) {
        Some((lower, _)) if last_close <= lower => {
            score += 2.0;
            BbPosition::BelowLower
        }
        Some((_, upper)) if last_close >= upper => {
            score -= 2.0;
            BbPosition::AboveUpper
        }
        _ => BbPosition::Inside,
    };

    let trend_ma = match (sma(closes, 50), sma(closes, 200)) {
        (Some(ma50), Some(ma200)) if ma50 > ma200 => {
            score += 2.0;
            TrendMa::GoldenCross
        }
        (Some(ma50), Some(ma200)) if ma50 < ma200 => {
            score -= 2.0;
            TrendMa::DeathCross
        }
        _ => TrendMa::Neutral,
    };

    let recommended_action = if score >= 5.0 {
        SignalAction::Buy
    } else if score <= -5.0 {
        SignalAction::Sell
    } else {
        SignalAction::Hold
    };

    ScoreResult {
        rsi_14: rsi,
        macd_signal,
        bb_position,
        trend_ma,
        composite_score: score,
        recommended_action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fewer_than_two_bars_falls_back_to_neutral() {
        let result = score_from_indicators(&[72_000.0]);
        assert_eq!(result.rsi_14, 50.0);
        assert_eq!(result.composite_score, 0.0);
        assert_eq!(result.recommended_action, SignalAction::Hold);
    }

    #[test]
    fn strongly_oversold_series_scores_buy() {
        // A long steady decline drives RSI well under 30 and pushes price
        // below the lower Bollinger band.
        let closes: Vec<f64> = (0..60).map(|i| 100_000.0 - i as f64 * 800.0).collect();
        let result = score_from_indicators(&closes);
        assert!(result.rsi_14 < 30.0);
        assert!(result.composite_score > 0.0);
    }

    #[test]
    fn flat_series_scores_neutral() {
        let closes = vec![72_000.0; 60];
        let result = score_from_indicators(&closes);
        assert_eq!(result.recommended_action, SignalAction::Hold);
    }

    #[test]
    fn rsi_with_no_losses_is_100() {
        let closes: Vec<f64> = (0..20).map(|i| 50_000.0 + i as f64 * 100.0).collect();
        assert_eq!(rsi_14(&closes, 14), 100.0);
    }

    #[test]
    fn sma_requires_full_window() {
        assert_eq!(sma(&[1.0, 2.0], 5), None);
        assert_eq!(sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 5), Some(3.0));
    }
}
