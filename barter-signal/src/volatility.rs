//! Multi-timeframe volatility.
//!
//! ATR uses a simple average of the trailing true ranges (not Wilder smoothing). Return
//! volatility is EWMA where a decay is defined for the timeframe, with a realized (RMS)
//! fallback. Only the 4h reading feeds the signal; the rest are reported.

use crate::{
    config::VolatilityConfig,
    error::SignalError,
    types::{Candle, CandleSeries, Timeframe},
};
use serde::Serialize;
use tracing::debug;

/// True range for each candle after the first:
/// max(high - low, |high - prev_close|, |low - prev_close|)
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .map(|pair| {
            let (prev, candle) = (&pair[0], &pair[1]);
            (candle.high - candle.low)
                .max((candle.high - prev.close).abs())
                .max((candle.low - prev.close).abs())
        })
        .collect()
}

/// Average of the last `period` true ranges. Needs `period + 1` candles.
pub fn atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }
    let ranges = true_ranges(candles);
    let window = &ranges[ranges.len() - period..];
    let value = window.iter().sum::<f64>() / period as f64;
    value.is_finite().then_some(value)
}

/// Close-to-close log returns, skipping non-positive closes
pub fn log_returns(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .filter(|pair| pair[0].close > 0.0 && pair[1].close > 0.0)
        .map(|pair| (pair[1].close / pair[0].close).ln())
        .collect()
}

/// RiskMetrics-style EWMA volatility, seeded with the first squared return.
pub fn ewma_volatility(returns: &[f64], lambda: f64) -> Option<f64> {
    let (first, rest) = returns.split_first()?;
    let variance = rest
        .iter()
        .fold(first * first, |variance, r| lambda * variance + (1.0 - lambda) * r * r);
    Some(variance.sqrt())
}

/// Root-mean-square of the last `window` returns
pub fn realized_volatility(returns: &[f64], window: usize) -> Option<f64> {
    if returns.is_empty() || window == 0 {
        return None;
    }
    let tail = &returns[returns.len().saturating_sub(window)..];
    let mean_square = tail.iter().map(|r| r * r).sum::<f64>() / tail.len() as f64;
    Some(mean_square.sqrt())
}

/// EWMA decay per timeframe; 4h has none and uses the realized fallback
pub fn ewma_lambda(timeframe: Timeframe) -> Option<f64> {
    match timeframe {
        Timeframe::M5 => Some(0.97),
        Timeframe::M15 => Some(0.96),
        Timeframe::H1 => Some(0.94),
        Timeframe::H4 => None,
    }
}

/// How a return volatility figure was obtained
#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityMethod {
    Ewma,
    Realized,
}

/// Volatility figures for one timeframe
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VolatilityReading {
    pub timeframe: Timeframe,
    pub atr: f64,
    /// ATR as % of price
    pub atr_pct: f64,
    /// Per-bar return volatility
    pub volatility: Option<f64>,
    pub method: Option<VolatilityMethod>,
}

impl VolatilityReading {
    /// `None` when the series is too short for an ATR.
    pub fn compute(
        timeframe: Timeframe,
        candles: &[Candle],
        current_price: f64,
        config: &VolatilityConfig,
    ) -> Option<Self> {
        let atr = atr(candles, config.atr_period)?;
        let atr_pct = if current_price > 0.0 {
            atr / current_price * 100.0
        } else {
            0.0
        };

        let returns = log_returns(candles);
        let ewma = ewma_lambda(timeframe).and_then(|lambda| ewma_volatility(&returns, lambda));
        let (volatility, method) = match ewma {
            Some(vol) => (Some(vol), Some(VolatilityMethod::Ewma)),
            None => match realized_volatility(&returns, config.realized_window) {
                Some(vol) => (Some(vol), Some(VolatilityMethod::Realized)),
                None => (None, None),
            },
        };

        Some(Self {
            timeframe,
            atr,
            atr_pct,
            volatility,
            method,
        })
    }
}

/// Short vs medium horizon volatility direction
#[derive(Clone, Debug, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolTrend {
    Expanding,
    Contracting,
    #[default]
    Stable,
}

impl VolTrend {
    /// 15m vs 1h volatility: > 1.2 expanding, < 0.8 contracting
    pub fn from_ratio(short: Option<f64>, long: Option<f64>) -> Self {
        match (short, long) {
            (Some(short), Some(long)) if long > 0.0 => {
                let ratio = short / long;
                if ratio > 1.2 {
                    VolTrend::Expanding
                } else if ratio < 0.8 {
                    VolTrend::Contracting
                } else {
                    VolTrend::Stable
                }
            }
            _ => VolTrend::Stable,
        }
    }
}

/// Primary (authoritative) and best-effort secondary readings
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VolatilityProfile {
    pub primary: VolatilityReading,
    pub secondary: Vec<VolatilityReading>,
    pub trend: VolTrend,
}

impl VolatilityProfile {
    pub fn compute(
        candles: &CandleSeries,
        current_price: f64,
        config: &VolatilityConfig,
    ) -> Result<Self, SignalError> {
        let primary =
            VolatilityReading::compute(Timeframe::H4, candles.primary(), current_price, config)
                .ok_or(SignalError::PrimaryVolatilityUnavailable {
                    available: candles.primary().len(),
                    required: config.atr_period + 1,
                })?;

        let secondary: Vec<VolatilityReading> = Timeframe::SECONDARY
            .into_iter()
            .filter_map(|timeframe| {
                let reading = VolatilityReading::compute(
                    timeframe,
                    candles.get(timeframe),
                    current_price,
                    config,
                );
                if reading.is_none() {
                    debug!(%timeframe, candles = candles.get(timeframe).len(), "secondary volatility unavailable");
                }
                reading
            })
            .collect();

        let volatility_of = |timeframe: Timeframe| {
            secondary
                .iter()
                .find(|r| r.timeframe == timeframe)
                .and_then(|r| r.volatility)
        };
        let trend = VolTrend::from_ratio(volatility_of(Timeframe::M15), volatility_of(Timeframe::H1));

        Ok(Self {
            primary,
            secondary,
            trend,
        })
    }

    pub fn atr(&self) -> f64 {
        self.primary.atr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(close: f64, range: f64) -> Candle {
        Candle::new(close, close + range / 2.0, close - range / 2.0, close, 1.0)
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let candles = vec![
            Candle::new(100.0, 101.0, 99.0, 100.0, 1.0),
            // gap up: high - prev_close dominates
            Candle::new(108.0, 110.0, 107.0, 109.0, 1.0),
            // gap down: prev_close - low dominates
            Candle::new(100.0, 101.0, 95.0, 96.0, 1.0),
        ];

        assert_eq!(true_ranges(&candles), vec![10.0, 14.0]);
    }

    #[test]
    fn test_atr_is_simple_average_of_last_period() {
        let mut candles: Vec<Candle> = (0..10).map(|_| flat(100.0, 20.0)).collect();
        candles.extend((0..14).map(|_| flat(100.0, 2.0)));

        // Only the trailing 14 ranges (all 2.0) count
        let value = atr(&candles, 14).unwrap();
        assert!((value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_atr_requires_period_plus_one() {
        let candles: Vec<Candle> = (0..14).map(|_| flat(100.0, 2.0)).collect();
        assert!(atr(&candles, 14).is_none());
        assert!(atr(&candles, 13).is_some());
        assert!(atr(&candles, 0).is_none());
    }

    #[test]
    fn test_ewma_and_realized() {
        assert!(ewma_volatility(&[], 0.94).is_none());
        assert!(realized_volatility(&[], 30).is_none());

        let returns = vec![0.01, -0.01, 0.01, -0.01];
        let ewma = ewma_volatility(&returns, 0.94).unwrap();
        assert!((ewma - 0.01).abs() < 1e-12);

        let rms = realized_volatility(&[0.5, 0.03, -0.04], 2).unwrap();
        assert!((rms - (0.0025_f64 / 2.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_reading_picks_method_by_timeframe() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| flat(100.0 + (i % 3) as f64, 2.0))
            .collect();
        let config = VolatilityConfig::default();

        let h1 = VolatilityReading::compute(Timeframe::H1, &candles, 100.0, &config).unwrap();
        assert_eq!(h1.method, Some(VolatilityMethod::Ewma));

        let h4 = VolatilityReading::compute(Timeframe::H4, &candles, 100.0, &config).unwrap();
        assert_eq!(h4.method, Some(VolatilityMethod::Realized));
        assert!(h4.atr_pct > 0.0);
    }

    #[test]
    fn test_profile_requires_primary_only() {
        let config = VolatilityConfig::default();
        let mut series = CandleSeries {
            h1: (0..30).map(|_| flat(100.0, 2.0)).collect(),
            ..Default::default()
        };

        assert_eq!(
            VolatilityProfile::compute(&series, 100.0, &config),
            Err(SignalError::PrimaryVolatilityUnavailable {
                available: 0,
                required: 15
            })
        );

        series.h4 = (0..20).map(|_| flat(100.0, 4.0)).collect();
        let profile = VolatilityProfile::compute(&series, 100.0, &config).unwrap();
        assert!((profile.atr() - 4.0).abs() < 1e-9);
        assert_eq!(profile.secondary.len(), 1);
        assert_eq!(profile.trend, VolTrend::Stable);
    }

    #[test]
    fn test_vol_trend() {
        assert_eq!(VolTrend::from_ratio(Some(1.5), Some(1.0)), VolTrend::Expanding);
        assert_eq!(VolTrend::from_ratio(Some(0.5), Some(1.0)), VolTrend::Contracting);
        assert_eq!(VolTrend::from_ratio(Some(1.0), Some(1.0)), VolTrend::Stable);
        assert_eq!(VolTrend::from_ratio(None, Some(1.0)), VolTrend::Stable);
    }
}
