//! Order-flow metrics: CVD, LCI and MELA.
//!
//! Each metric maps to a 0-100 score with 50 as neutral. A metric whose prerequisites are
//! missing reports itself unavailable and scores 50.

use crate::{
    aggregation::{ExchangeClusters, LiquidityBook, LiquidityCluster},
    config::FlowConfig,
    types::Candle,
};
use itertools::Itertools;
use serde::Serialize;

const NEUTRAL: f64 = 50.0;

/// Cumulative volume delta over the trailing candles
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CvdReading {
    pub available: bool,
    /// Signed volume sum (up candles add, down candles subtract)
    pub delta: f64,
    pub total_volume: f64,
    pub score: f64,
}

impl CvdReading {
    pub fn compute(candles: &[Candle], config: &FlowConfig) -> Self {
        let window = &candles[candles.len().saturating_sub(config.cvd_lookback)..];

        let (delta, total_volume) = window
            .iter()
            .filter(|c| c.volume.is_finite() && c.volume >= 0.0)
            .fold((0.0, 0.0), |(delta, total), candle| {
                let signed = if candle.is_up() {
                    candle.volume
                } else if candle.is_down() {
                    -candle.volume
                } else {
                    0.0
                };
                (delta + signed, total + candle.volume)
            });

        if total_volume <= 0.0 {
            return Self {
                available: false,
                delta,
                total_volume,
                score: NEUTRAL,
            };
        }

        let pressure = (delta / total_volume * config.cvd_gain).clamp(-1.0, 1.0);
        Self {
            available: true,
            delta,
            total_volume,
            score: (NEUTRAL + NEUTRAL * pressure).clamp(0.0, 100.0),
        }
    }
}

/// Liquidity concentration index: share of combined notional within ±ATR of price
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LciReading {
    pub ratio: Option<f64>,
    pub score: f64,
}

impl LciReading {
    pub fn compute(combined: &LiquidityBook, current_price: f64, atr: f64) -> Self {
        let total = combined.total();
        if total <= 0.0 || !atr.is_finite() {
            return Self {
                ratio: None,
                score: NEUTRAL,
            };
        }

        let (bid, ask) = combined.notional_within(current_price, atr);
        let ratio = ((bid + ask) / total).clamp(0.0, 1.0);
        Self {
            ratio: Some(ratio),
            score: (ratio * 100.0).round(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.ratio.is_some()
    }
}

/// Fraction of `a`'s cluster midpoints with a `b` midpoint within `width`, over max(|a|, |b|)
pub fn side_agreement(a: &[LiquidityCluster], b: &[LiquidityCluster], width: f64) -> Option<f64> {
    let denominator = a.len().max(b.len());
    if denominator == 0 {
        return None;
    }

    let matched = a
        .iter()
        .filter(|ca| {
            b.iter()
                .any(|cb| (ca.midpoint() - cb.midpoint()).abs() <= width)
        })
        .count();

    Some(matched as f64 / denominator as f64)
}

/// Multi-exchange liquidity agreement
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MelaReading {
    pub ratio: Option<f64>,
    /// Exchange pairs that contributed
    pub pairs: usize,
    pub score: f64,
}

impl MelaReading {
    /// Averages bid/ask agreement per exchange pair, then across pairs.
    pub fn compute(exchanges: &[ExchangeClusters], width: f64) -> Self {
        let ratios: Vec<f64> = exchanges
            .iter()
            .tuple_combinations()
            .filter_map(|(a, b)| {
                let sides = [
                    side_agreement(&a.bids, &b.bids, width),
                    side_agreement(&a.asks, &b.asks, width),
                ];
                let available: Vec<f64> = sides.into_iter().flatten().collect();
                (!available.is_empty())
                    .then(|| available.iter().sum::<f64>() / available.len() as f64)
            })
            .collect();

        if ratios.is_empty() {
            return Self {
                ratio: None,
                pairs: 0,
                score: NEUTRAL,
            };
        }

        let ratio = ratios.iter().sum::<f64>() / ratios.len() as f64;
        Self {
            ratio: Some(ratio),
            pairs: ratios.len(),
            score: (ratio * 100.0).round().clamp(0.0, 100.0),
        }
    }

    pub fn is_available(&self) -> bool {
        self.ratio.is_some()
    }
}

/// All three flow metrics for one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowReading {
    pub cvd: CvdReading,
    pub lci: LciReading,
    pub mela: MelaReading,
}

impl FlowReading {
    pub fn compute(
        candles: &[Candle],
        combined: &LiquidityBook,
        exchanges: &[ExchangeClusters],
        current_price: f64,
        atr: f64,
        width: f64,
        config: &FlowConfig,
    ) -> Self {
        Self {
            cvd: CvdReading::compute(candles, config),
            lci: LciReading::compute(combined, current_price, atr),
            mela: MelaReading::compute(exchanges, width),
        }
    }

    pub fn cvd_score(&self) -> f64 {
        self.cvd.score
    }

    pub fn lci_score(&self) -> f64 {
        self.lci.score
    }

    pub fn mela_score(&self) -> f64 {
        self.mela.score
    }
}

impl Default for FlowReading {
    fn default() -> Self {
        Self {
            cvd: CvdReading {
                available: false,
                delta: 0.0,
                total_volume: 0.0,
                score: NEUTRAL,
            },
            lci: LciReading {
                ratio: None,
                score: NEUTRAL,
            },
            mela: MelaReading {
                ratio: None,
                pairs: 0,
                score: NEUTRAL,
            },
        }
    }
}
