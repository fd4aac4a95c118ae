//! Conviction & signal engine.
//!
//! Combines liquidity, trend, proximity, futures, momentum and flow biases into independent
//! buy/sell scores, applies the stressed-regime suppression rule and the decision rule, then
//! runs the result through the per-symbol anti-oscillation layer (deadband, momentum gate,
//! trend persistence and conviction smoothing).

use crate::{
    aggregation::LiquidityDominance,
    config::{ConvictionConfig, SmoothingConfig},
    flow::FlowReading,
    regime::Regime,
    types::{Candle, FuturesMetrics, Signal},
};
use serde::Serialize;

const BASE_SCORE: f64 = 50.0;

fn clamp_round(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0).round()
    } else {
        BASE_SCORE
    }
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(-1.0, 1.0)
}

fn clamp_abs(value: f64, cap: f64) -> f64 {
    value.clamp(-cap, cap)
}

/// Fraction of the trailing `window` closes that finished below the previous close.
pub fn down_close_ratio(candles: &[Candle], window: usize) -> Option<f64> {
    if window == 0 || candles.len() < 2 {
        return None;
    }
    let tail = &candles[candles.len().saturating_sub(window + 1)..];
    let moves = tail.len() - 1;
    let downs = tail.windows(2).filter(|pair| pair[1].close < pair[0].close).count();
    Some(downs as f64 / moves as f64)
}

/// Smoothing state carried between ticks for one symbol.
///
/// Owned by the caller and passed into every evaluation; never shared across symbols.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineState {
    last_signal: Signal,
    last_buy_score: Option<f64>,
    last_sell_score: Option<f64>,
    last_conviction: Option<f64>,
    /// Directional call currently accumulating persistence
    pending_signal: Signal,
    trend_persist_counter: u32,
}

impl EngineState {
    pub fn last_signal(&self) -> Signal {
        self.last_signal
    }

    pub fn last_buy_score(&self) -> Option<f64> {
        self.last_buy_score
    }

    pub fn last_sell_score(&self) -> Option<f64> {
        self.last_sell_score
    }

    pub fn last_conviction(&self) -> Option<f64> {
        self.last_conviction
    }

    pub fn pending_signal(&self) -> Signal {
        self.pending_signal
    }

    pub fn trend_persist_counter(&self) -> u32 {
        self.trend_persist_counter
    }
}

/// Everything the conviction engine reads for one tick
#[derive(Debug, Clone, PartialEq)]
pub struct ConvictionInputs {
    pub dominance: LiquidityDominance,
    /// TALR input; `None` leaves the trend bias at zero
    pub down_close_ratio: Option<f64>,
    pub support_distance: Option<f64>,
    pub resistance_distance: Option<f64>,
    /// Distance at which the proximity pull fades to zero
    pub proximity_reach: f64,
    pub bid_mass: f64,
    pub ask_mass: f64,
    pub futures: Option<FuturesMetrics>,
    /// `None` when momentum is unavailable
    pub momentum_score: Option<f64>,
    pub flow: FlowReading,
    pub cross_asset_modifier: Option<f64>,
    pub regime: Regime,
}

/// Individual bias contributions (before weighting where a weight applies)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BiasBreakdown {
    pub dominance: f64,
    pub talr: f64,
    pub proximity_buy: f64,
    pub proximity_sell: f64,
    pub proximity_factor: f64,
    pub mass: f64,
    pub futures: f64,
    pub momentum: f64,
    pub cvd: f64,
    pub lci: f64,
    pub mela: f64,
    /// Cross-asset modifier actually used (explicit or futures proxy)
    pub cross_asset_modifier: f64,
    pub cross_asset: f64,
    pub suppression_penalty: f64,
}

impl BiasBreakdown {
    pub fn flow_sum(&self) -> f64 {
        self.cvd + self.lci + self.mela
    }
}

/// Outcome of the suppression rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Suppression {
    pub buy_score: f64,
    pub sell_score: f64,
    pub penalty: f64,
    pub applied: bool,
}

/// Final per-tick conviction output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvictionResult {
    pub signal: Signal,
    /// Decision-rule output before the anti-oscillation layer
    pub raw_signal: Signal,
    pub conviction: f64,
    pub buy_score: f64,
    pub sell_score: f64,
    pub bias: BiasBreakdown,
    pub regime: Regime,
    pub suppressed: bool,
    /// Emitted signal is the previous one, held while a new call builds persistence
    pub held: bool,
}

/// Apply the decision rule; conviction is the winning score, or the mean for HOLD.
pub fn decide_signal(buy_score: f64, sell_score: f64, config: &ConvictionConfig) -> (Signal, f64) {
    if buy_score > sell_score + config.decision_gap && buy_score >= config.min_signal_score {
        (Signal::Buy, buy_score)
    } else if sell_score > buy_score + config.decision_gap && sell_score >= config.min_signal_score {
        (Signal::Sell, sell_score)
    } else {
        (Signal::Hold, (buy_score + sell_score) / 2.0)
    }
}

/// Penalise BUY under stressed, sell-pressured, risk-off conditions.
///
/// Below the buy cap the penalty scales with how far CVD sits under its threshold (with a
/// floor); at or above the cap a small fixed penalty applies. Part of the penalty is credited
/// to the sell score in both branches.
pub fn apply_suppression(
    buy_score: f64,
    sell_score: f64,
    regime: Regime,
    cvd_score: f64,
    cross_asset_modifier: f64,
    config: &ConvictionConfig,
) -> Suppression {
    let triggered = regime.is_stressed()
        && cvd_score < config.suppression_cvd_threshold
        && cross_asset_modifier < 0.0;

    if !triggered {
        return Suppression {
            buy_score,
            sell_score,
            penalty: 0.0,
            applied: false,
        };
    }

    let penalty = if buy_score < config.suppression_buy_cap {
        ((config.suppression_cvd_threshold - cvd_score) * config.suppression_penalty_per_cvd_point)
            .max(config.suppression_min_penalty)
    } else {
        config.suppression_small_penalty
    };

    Suppression {
        buy_score: clamp_round(buy_score - penalty),
        sell_score: clamp_round(sell_score + (penalty * config.suppression_sell_credit).round()),
        penalty,
        applied: true,
    }
}

#[derive(Debug, Clone)]
pub struct ConvictionEngine {
    conviction: ConvictionConfig,
    smoothing: SmoothingConfig,
}

impl ConvictionEngine {
    pub fn new(conviction: ConvictionConfig, smoothing: SmoothingConfig) -> Self {
        Self {
            conviction,
            smoothing,
        }
    }

    /// Cross-asset modifier: explicit value, else a long/short ratio proxy, else zero
    fn cross_asset_modifier(&self, inputs: &ConvictionInputs) -> f64 {
        let config = &self.conviction;
        inputs
            .cross_asset_modifier
            .filter(|v| v.is_finite())
            .or_else(|| {
                let ratio = inputs.futures?.long_short_ratio?;
                Some(clamp_abs(
                    (ratio - 1.0) * config.cross_asset_proxy_scale,
                    config.cross_asset_proxy_cap,
                ))
            })
            .unwrap_or(0.0)
    }

    /// Funding and long/short components, weighted by log-scaled open-interest strength
    fn futures_bias(&self, futures: Option<FuturesMetrics>) -> f64 {
        let config = &self.conviction;
        let Some(futures) = futures else {
            return 0.0;
        };

        // Positive funding means crowded longs: bearish
        let funding = futures
            .funding_rate
            .map_or(0.0, |rate| -clamp_unit(rate / config.funding_rate_scale));
        let ratio = futures
            .long_short_ratio
            .map_or(0.0, |lsr| clamp_unit((lsr - 1.0) / config.long_short_scale));
        let strength = futures
            .open_interest_usd
            .filter(|oi| *oi >= 0.0)
            .map_or(config.futures_base_strength, |oi| {
                ((1.0 + oi / 1_000_000.0).ln() * 5.0).min(config.futures_strength_cap)
            });

        let bias = strength * config.futures_component_weight * (funding + ratio);
        if bias.is_finite() { bias } else { 0.0 }
    }

    /// Raw biases and pre-suppression scores
    pub fn score(&self, inputs: &ConvictionInputs) -> (BiasBreakdown, f64, f64) {
        let config = &self.conviction;
        let direction = inputs.dominance.direction();

        let talr = inputs
            .down_close_ratio
            .map_or(0.0, |ratio| (0.5 - ratio) * 2.0 * config.talr_cap);

        let pull = |distance: Option<f64>| -> f64 {
            match distance {
                Some(d) if inputs.proximity_reach > 0.0 => {
                    config.proximity_cap * (1.0 - d / inputs.proximity_reach).clamp(0.0, 1.0)
                }
                _ => 0.0,
            }
        };
        let proximity_buy = pull(inputs.support_distance);
        let proximity_sell = pull(inputs.resistance_distance);

        let proximity_factor = match (inputs.support_distance, inputs.resistance_distance) {
            (Some(support), Some(resistance)) if support + resistance > 0.0 => {
                (resistance - support) / (support + resistance) * config.proximity_factor_cap
            }
            _ => 0.0,
        };

        let mass_total = inputs.bid_mass + inputs.ask_mass;
        let mass = if mass_total > 0.0 {
            (inputs.bid_mass - inputs.ask_mass) / mass_total * config.mass_cap
        } else {
            0.0
        };

        let momentum = inputs.momentum_score.map_or(0.0, |score| {
            clamp_abs((score - BASE_SCORE) * config.momentum_scale, config.momentum_cap)
        });

        let flow = &inputs.flow;
        let cvd = if flow.cvd.available {
            direction * clamp_abs((flow.cvd_score() - BASE_SCORE) * config.cvd_scale, config.flow_cap)
        } else {
            0.0
        };
        let lci = if flow.lci.is_available() {
            direction * (flow.lci_score() * config.lci_scale).min(config.flow_cap)
        } else {
            0.0
        };
        let mela = if flow.mela.is_available() {
            direction * clamp_abs((flow.mela_score() - BASE_SCORE) * config.mela_scale, config.flow_cap)
        } else {
            0.0
        };

        let cross_asset_modifier = self.cross_asset_modifier(inputs);
        let cross_asset = clamp_abs(cross_asset_modifier * config.cross_asset_weight, config.cross_asset_cap);

        let bias = BiasBreakdown {
            dominance: inputs.dominance.bias(),
            talr,
            proximity_buy,
            proximity_sell,
            proximity_factor,
            mass,
            futures: self.futures_bias(inputs.futures),
            momentum,
            cvd,
            lci,
            mela,
            cross_asset_modifier,
            cross_asset,
            suppression_penalty: 0.0,
        };

        let directional = config.dominance_weight * bias.dominance
            + config.talr_weight * bias.talr
            + config.mass_weight * bias.mass
            + bias.futures
            + bias.momentum
            + bias.flow_sum()
            + bias.proximity_factor
            + bias.cross_asset;

        let buy_score = clamp_round(BASE_SCORE + directional + config.proximity_weight * proximity_buy);
        let sell_score = clamp_round(BASE_SCORE - directional + config.proximity_weight * proximity_sell);

        (bias, buy_score, sell_score)
    }

    /// Deadband, momentum gate, persistence and conviction smoothing.
    ///
    /// Returns the emitted signal, the smoothed conviction and whether the emitted signal was
    /// held over from a previous tick.
    ///
    /// Conviction always follows the emitted signal: a BUY held against a new SELL candidate
    /// reports the current buy score (the held side), even when it is the lower of the two.
    /// A HOLD reports the mean of both scores.
    pub fn stabilise(
        &self,
        state: &mut EngineState,
        candidate: Signal,
        buy_score: f64,
        sell_score: f64,
        momentum_score: Option<f64>,
    ) -> (Signal, f64, bool) {
        let smoothing = &self.smoothing;

        let mut candidate = candidate;
        if (buy_score - sell_score).abs() < smoothing.deadband {
            candidate = Signal::Hold;
        }

        if let Some(momentum) = momentum_score {
            let confirmed = match candidate {
                Signal::Buy => momentum >= smoothing.momentum_confirm_buy,
                Signal::Sell => momentum <= smoothing.momentum_confirm_sell,
                Signal::Hold => true,
            };
            if !confirmed {
                candidate = Signal::Hold;
            }
        }

        let (emitted, held) = if candidate.is_directional() {
            if candidate == state.pending_signal {
                state.trend_persist_counter = state.trend_persist_counter.saturating_add(1);
            } else {
                state.pending_signal = candidate;
                state.trend_persist_counter = 1;
            }

            if state.trend_persist_counter >= smoothing.persist_ticks {
                (candidate, false)
            } else {
                (state.last_signal, state.last_signal != candidate)
            }
        } else {
            state.pending_signal = Signal::Hold;
            state.trend_persist_counter = 0;
            (Signal::Hold, false)
        };

        let current = match emitted {
            Signal::Buy => buy_score,
            Signal::Sell => sell_score,
            Signal::Hold => (buy_score + sell_score) / 2.0,
        };
        let conviction = match state.last_conviction {
            Some(previous) => {
                smoothing.conviction_smoothing * previous
                    + (1.0 - smoothing.conviction_smoothing) * current
            }
            None => current,
        };
        let conviction = clamp_round(conviction);

        state.last_signal = emitted;
        state.last_buy_score = Some(buy_score);
        state.last_sell_score = Some(sell_score);
        state.last_conviction = Some(conviction);

        (emitted, conviction, held)
    }

    /// Score, suppress, decide and stabilise one tick.
    pub fn evaluate(&self, state: &mut EngineState, inputs: &ConvictionInputs) -> ConvictionResult {
        let (mut bias, buy_score, sell_score) = self.score(inputs);

        let suppression = apply_suppression(
            buy_score,
            sell_score,
            inputs.regime,
            inputs.flow.cvd_score(),
            bias.cross_asset_modifier,
            &self.conviction,
        );
        bias.suppression_penalty = suppression.penalty;

        let (raw_signal, _) =
            decide_signal(suppression.buy_score, suppression.sell_score, &self.conviction);

        let (signal, conviction, held) = self.stabilise(
            state,
            raw_signal,
            suppression.buy_score,
            suppression.sell_score,
            inputs.momentum_score,
        );

        ConvictionResult {
            signal,
            raw_signal,
            conviction,
            buy_score: suppression.buy_score,
            sell_score: suppression.sell_score,
            bias,
            regime: inputs.regime,
            suppressed: suppression.applied,
            held,
        }
    }
}

impl Default for ConvictionEngine {
    fn default() -> Self {
        Self::new(ConvictionConfig::default(), SmoothingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{CvdReading, LciReading};

    fn neutral_inputs() -> ConvictionInputs {
        ConvictionInputs {
            dominance: LiquidityDominance {
                buy_pct: 50.0,
                sell_pct: 50.0,
            },
            down_close_ratio: None,
            support_distance: None,
            resistance_distance: None,
            proximity_reach: 30.0,
            bid_mass: 0.0,
            ask_mass: 0.0,
            futures: None,
            momentum_score: None,
            flow: FlowReading::default(),
            cross_asset_modifier: None,
            regime: Regime::Normal,
        }
    }

    #[test]
    fn test_decide_signal() {
        struct TestCase {
            buy: f64,
            sell: f64,
            expected: (Signal, f64),
        }

        let tests = vec![
            TestCase {
                // TC0: clear BUY, conviction is the buy score
                buy: 70.0,
                sell: 55.0,
                expected: (Signal::Buy, 70.0),
            },
            TestCase {
                // TC1: gap ok but buy below 60
                buy: 58.0,
                sell: 52.0,
                expected: (Signal::Hold, 55.0),
            },
            TestCase {
                // TC2: balanced
                buy: 50.0,
                sell: 50.0,
                expected: (Signal::Hold, 50.0),
            },
            TestCase {
                // TC3: clear SELL
                buy: 40.0,
                sell: 72.0,
                expected: (Signal::Sell, 72.0),
            },
            TestCase {
                // TC4: gap of exactly 8 is not enough
                buy: 68.0,
                sell: 60.0,
                expected: (Signal::Hold, 64.0),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = decide_signal(test.buy, test.sell, &ConvictionConfig::default());
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_suppression_small_penalty_above_cap() {
        let config = ConvictionConfig::default();
        let result = apply_suppression(65.0, 40.0, Regime::LiquidityStressed, 20.0, -2.0, &config);

        assert!(result.applied);
        assert_eq!(result.penalty, 8.0);
        assert_eq!(result.buy_score, 57.0);
        assert_eq!(result.sell_score, 44.0);
    }

    #[test]
    fn test_suppression_scales_below_cap() {
        let config = ConvictionConfig::default();

        // 40 - 20 = 20 points, above the 15 floor
        let result = apply_suppression(50.0, 45.0, Regime::LiquidityStressed, 20.0, -1.0, &config);
        assert_eq!(result.penalty, 20.0);
        assert_eq!(result.buy_score, 30.0);
        assert_eq!(result.sell_score, 55.0);

        // 40 - 35 = 5 points, floored at 15
        let result = apply_suppression(50.0, 45.0, Regime::LiquidityStressed, 35.0, -1.0, &config);
        assert_eq!(result.penalty, 15.0);
        assert_eq!(result.buy_score, 35.0);
        assert_eq!(result.sell_score, 53.0);
    }

    #[test]
    fn test_suppression_requires_all_conditions() {
        let config = ConvictionConfig::default();
        let cases = [
            (Regime::Normal, 20.0, -2.0),
            (Regime::LiquidityStressed, 45.0, -2.0),
            (Regime::LiquidityStressed, 20.0, 0.0),
        ];

        for (regime, cvd, cac) in cases {
            let result = apply_suppression(65.0, 40.0, regime, cvd, cac, &config);
            assert!(!result.applied);
            assert_eq!((result.buy_score, result.sell_score), (65.0, 40.0));
        }
    }

    #[test]
    fn test_deadband_holds_repeated_ticks() {
        let engine = ConvictionEngine::default();
        let mut state = EngineState::default();

        for _ in 0..2 {
            let (signal, _, _) = engine.stabilise(&mut state, Signal::Buy, 61.0, 50.0, None);
            assert_eq!(signal, Signal::Hold);
            assert_eq!(state.trend_persist_counter(), 0);
        }
    }

    #[test]
    fn test_persistence_and_smoothing() {
        let engine = ConvictionEngine::default();
        let mut state = EngineState::default();

        // First BUY is held at the previous HOLD; conviction is the score mean
        let (signal, conviction, held) = engine.stabilise(&mut state, Signal::Buy, 75.0, 50.0, Some(60.0));
        assert_eq!(signal, Signal::Hold);
        assert!(held);
        assert_eq!(conviction, 63.0);
        assert_eq!(state.pending_signal(), Signal::Buy);
        assert_eq!(state.trend_persist_counter(), 1);

        // Second consecutive BUY is emitted: 0.35 × 63 + 0.65 × 75 = 70.8
        let (signal, conviction, held) = engine.stabilise(&mut state, Signal::Buy, 75.0, 50.0, Some(60.0));
        assert_eq!(signal, Signal::Buy);
        assert!(!held);
        assert_eq!(conviction, 71.0);
        assert_eq!(state.last_signal(), Signal::Buy);

        // A flip to SELL is held at BUY, and conviction follows the held BUY side:
        // 0.35 × 71 + 0.65 × 45 = 54.1
        let (signal, conviction, held) = engine.stabilise(&mut state, Signal::Sell, 45.0, 75.0, Some(50.0));
        assert_eq!(signal, Signal::Buy);
        assert!(held);
        assert_eq!(conviction, 54.0);
        assert_eq!(state.pending_signal(), Signal::Sell);
        assert_eq!(state.trend_persist_counter(), 1);
    }

    #[test]
    fn test_momentum_gate_blocks_unconfirmed_calls() {
        let engine = ConvictionEngine::new(
            ConvictionConfig::default(),
            SmoothingConfig {
                persist_ticks: 1,
                ..SmoothingConfig::default()
            },
        );
        let mut state = EngineState::default();

        let (signal, _, _) = engine.stabilise(&mut state, Signal::Buy, 80.0, 50.0, Some(40.0));
        assert_eq!(signal, Signal::Hold);

        let (signal, _, _) = engine.stabilise(&mut state, Signal::Sell, 50.0, 80.0, Some(60.0));
        assert_eq!(signal, Signal::Hold);

        let (signal, _, _) = engine.stabilise(&mut state, Signal::Buy, 80.0, 50.0, Some(50.0));
        assert_eq!(signal, Signal::Buy);

        // Unavailable momentum skips the gate
        let (signal, _, _) = engine.stabilise(&mut state, Signal::Sell, 50.0, 80.0, None);
        assert_eq!(signal, Signal::Sell);
    }

    #[test]
    fn test_neutral_inputs_score_balanced() {
        let engine = ConvictionEngine::default();
        let (bias, buy, sell) = engine.score(&neutral_inputs());

        assert_eq!((buy, sell), (50.0, 50.0));
        assert_eq!(bias, BiasBreakdown::default());
    }

    #[test]
    fn test_scores_stay_bounded_under_extreme_inputs() {
        let engine = ConvictionEngine::default();
        let inputs = ConvictionInputs {
            dominance: LiquidityDominance {
                buy_pct: 100.0,
                sell_pct: 0.0,
            },
            down_close_ratio: Some(0.0),
            support_distance: Some(0.0),
            resistance_distance: Some(1000.0),
            bid_mass: 1e12,
            ask_mass: 0.0,
            futures: Some(FuturesMetrics {
                open_interest_usd: Some(1e12),
                funding_rate: Some(-0.01),
                long_short_ratio: Some(5.0),
            }),
            momentum_score: Some(100.0),
            cross_asset_modifier: Some(50.0),
            ..neutral_inputs()
        };

        let (_, buy, sell) = engine.score(&inputs);
        assert_eq!(buy, 100.0);
        assert_eq!(sell, 0.0);
    }

    #[test]
    fn test_futures_and_cross_asset_proxy() {
        let engine = ConvictionEngine::default();
        let inputs = ConvictionInputs {
            futures: Some(FuturesMetrics {
                open_interest_usd: None,
                funding_rate: None,
                long_short_ratio: Some(1.25),
            }),
            ..neutral_inputs()
        };

        let (bias, _, _) = engine.score(&inputs);
        // base strength 10 × 0.25 × ratio component 0.5
        assert!((bias.futures - 1.25).abs() < 1e-9);
        // proxy (1.25 - 1) × 10 = 2.5, weighted × 1.5
        assert!((bias.cross_asset_modifier - 2.5).abs() < 1e-9);
        assert!((bias.cross_asset - 3.75).abs() < 1e-9);
    }

    #[test]
    fn test_cvd_bias_follows_dominance_direction() {
        struct TestCase {
            dominance: LiquidityDominance,
            expected: f64,
        }

        let selling = FlowReading {
            cvd: CvdReading {
                available: true,
                delta: -3.0,
                total_volume: 100.0,
                score: 20.0,
            },
            ..FlowReading::default()
        };

        let tests = vec![
            TestCase {
                // TC0: bids dominate, (20 - 50) × 0.2 keeps its sign
                dominance: LiquidityDominance {
                    buy_pct: 70.0,
                    sell_pct: 30.0,
                },
                expected: -6.0,
            },
            TestCase {
                // TC1: asks dominate, sign flips
                dominance: LiquidityDominance {
                    buy_pct: 30.0,
                    sell_pct: 70.0,
                },
                expected: 6.0,
            },
            TestCase {
                // TC2: exact tie contributes nothing
                dominance: LiquidityDominance {
                    buy_pct: 50.0,
                    sell_pct: 50.0,
                },
                expected: 0.0,
            },
        ];

        let engine = ConvictionEngine::default();
        for (index, test) in tests.into_iter().enumerate() {
            let inputs = ConvictionInputs {
                dominance: test.dominance,
                flow: selling,
                ..neutral_inputs()
            };
            let (bias, _, _) = engine.score(&inputs);
            assert!((bias.cvd - test.expected).abs() < 1e-9, "TC{} failed", index);
        }
    }

    #[test]
    fn test_balanced_dominance_gives_no_flow_direction() {
        let engine = ConvictionEngine::new(
            ConvictionConfig::default(),
            SmoothingConfig {
                persist_ticks: 1,
                ..SmoothingConfig::default()
            },
        );
        let mut state = EngineState::default();
        let inputs = ConvictionInputs {
            flow: FlowReading {
                lci: LciReading {
                    ratio: Some(0.6),
                    score: 60.0,
                },
                ..FlowReading::default()
            },
            ..neutral_inputs()
        };

        let result = engine.evaluate(&mut state, &inputs);
        assert_eq!(result.bias.lci, 0.0);
        assert_eq!((result.buy_score, result.sell_score), (50.0, 50.0));
        assert_eq!(result.raw_signal, Signal::Hold);
        assert_eq!(result.signal, Signal::Hold);

        // The same concentration under bid dominance does pull toward BUY
        let bid_heavy = ConvictionInputs {
            dominance: LiquidityDominance {
                buy_pct: 52.0,
                sell_pct: 48.0,
            },
            ..inputs
        };
        let (bias, _, _) = engine.score(&bid_heavy);
        assert_eq!(bias.lci, 10.0);
    }

    #[test]
    fn test_down_close_ratio() {
        let candles: Vec<Candle> = [100.0, 99.0, 101.0, 100.0, 102.0]
            .iter()
            .map(|c| Candle::new(*c, *c, *c, *c, 1.0))
            .collect();

        assert_eq!(down_close_ratio(&candles, 20), Some(0.5));
        assert_eq!(down_close_ratio(&candles, 2), Some(0.5));
        assert_eq!(down_close_ratio(&candles, 1), Some(0.0));
        assert_eq!(down_close_ratio(&candles[..1], 20), None);
    }

    #[test]
    fn test_evaluate_end_to_end_updates_state() {
        let engine = ConvictionEngine::new(
            ConvictionConfig::default(),
            SmoothingConfig {
                persist_ticks: 1,
                ..SmoothingConfig::default()
            },
        );
        let mut state = EngineState::default();
        let inputs = ConvictionInputs {
            dominance: LiquidityDominance {
                buy_pct: 90.0,
                sell_pct: 10.0,
            },
            down_close_ratio: Some(0.2),
            momentum_score: Some(70.0),
            ..neutral_inputs()
        };

        let result = engine.evaluate(&mut state, &inputs);
        // 50 + 0.35 × 40 + 0.5 × 12 + 8 = 78 vs 50 - 28 = 22
        assert_eq!(result.buy_score, 78.0);
        assert_eq!(result.sell_score, 22.0);
        assert_eq!(result.raw_signal, Signal::Buy);
        assert_eq!(result.signal, Signal::Buy);
        assert_eq!(result.conviction, 78.0);
        assert!(!result.suppressed);
        assert_eq!(state.last_buy_score(), Some(78.0));
        assert_eq!(state.last_conviction(), Some(78.0));
    }
}
