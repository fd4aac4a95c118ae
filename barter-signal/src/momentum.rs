//! Momentum scoring from the primary candle series.
//!
//! RSI (Wilder), a normalised MACD histogram and a moving-average alignment score are blended
//! into one 0-100 momentum score. Short histories produce a neutral, unavailable reading.

use crate::{config::MomentumConfig, types::Candle};
use serde::Serialize;

/// Neutral value for every momentum sub-score
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Exponential Moving Average (EMA) calculator
///
/// Seeds with the first value and uses a simple average until `period` values are seen.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: f64,
    value: Option<f64>,
    count: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            value: None,
            count: 0,
        }
    }

    /// Update with a new value, returning the current EMA
    pub fn update(&mut self, new_value: f64) -> f64 {
        self.count += 1;

        let next = match self.value {
            None => new_value,
            Some(current) if self.count < self.period => {
                (current * (self.count - 1) as f64 + new_value) / self.count as f64
            }
            Some(current) => self.alpha * new_value + (1.0 - self.alpha) * current,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn is_ready(&self) -> bool {
        self.count >= self.period
    }
}

fn clamp_score(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        NEUTRAL_SCORE
    }
}

/// Wilder RSI. Needs `period + 1` closes.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = closes.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let (seed, rest) = changes.split_at(period);

    let mut avg_gain = seed.iter().filter(|c| **c > 0.0).sum::<f64>() / period as f64;
    let mut avg_loss = seed.iter().filter(|c| **c < 0.0).map(|c| -c).sum::<f64>() / period as f64;

    let smoothing = (period - 1) as f64;
    for change in rest {
        avg_gain = (avg_gain * smoothing + change.max(0.0)) / period as f64;
        avg_loss = (avg_loss * smoothing + (-change).max(0.0)) / period as f64;
    }

    let value = if avg_gain == 0.0 && avg_loss == 0.0 {
        NEUTRAL_SCORE
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };
    Some(clamp_score(value))
}

/// Latest MACD values and the derived 0-100 score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    /// Latest histogram over the trailing mean absolute histogram
    pub normalized: f64,
    pub score: f64,
}

/// MACD(fast, slow, signal) over the whole series, scored as 50 ± 25 × normalised histogram.
pub fn macd(closes: &[f64], config: &MomentumConfig) -> Option<MacdReading> {
    if closes.len() < config.macd_slow {
        return None;
    }

    let mut fast = Ema::new(config.macd_fast);
    let mut slow = Ema::new(config.macd_slow);
    let mut signal = Ema::new(config.macd_signal);

    let mut last = (0.0, 0.0);
    let histograms: Vec<f64> = closes
        .iter()
        .map(|close| {
            let line = fast.update(*close) - slow.update(*close);
            let signal_line = signal.update(line);
            last = (line, signal_line);
            line - signal_line
        })
        .collect();

    let histogram = *histograms.last()?;
    let window = &histograms[histograms.len().saturating_sub(config.macd_norm_window)..];
    let magnitude = window.iter().map(|h| h.abs()).sum::<f64>() / window.len() as f64;

    let normalized = if magnitude > 0.0 {
        histogram / magnitude
    } else {
        0.0
    };

    Some(MacdReading {
        macd: last.0,
        signal: last.1,
        histogram,
        normalized,
        score: clamp_score(NEUTRAL_SCORE + 25.0 * normalized),
    })
}

/// Mean of the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let tail = &values[values.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}

/// MA alignment: 70 when MA50 > MA200 else 30, ±10 when price is strictly beyond both.
/// Without MA200 the score starts from neutral and only compares against MA50.
pub fn ma_score(close: f64, ma_fast: f64, ma_slow: Option<f64>) -> f64 {
    let score = match ma_slow {
        Some(ma_slow) => {
            let base = if ma_fast > ma_slow { 70.0 } else { 30.0 };
            if close > ma_fast && close > ma_slow {
                base + 10.0
            } else if close < ma_fast && close < ma_slow {
                base - 10.0
            } else {
                base
            }
        }
        None if close > ma_fast => NEUTRAL_SCORE + 10.0,
        None if close < ma_fast => NEUTRAL_SCORE - 10.0,
        None => NEUTRAL_SCORE,
    };
    clamp_score(score)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentumReading {
    pub available: bool,
    pub rsi: f64,
    pub rsi_score: f64,
    pub macd_hist: f64,
    pub macd_score: f64,
    pub ma50: Option<f64>,
    pub ma200: Option<f64>,
    pub ma_score: f64,
    pub momentum_score: f64,
}

impl MomentumReading {
    pub fn neutral() -> Self {
        Self {
            available: false,
            rsi: NEUTRAL_SCORE,
            rsi_score: NEUTRAL_SCORE,
            macd_hist: 0.0,
            macd_score: NEUTRAL_SCORE,
            ma50: None,
            ma200: None,
            ma_score: NEUTRAL_SCORE,
            momentum_score: NEUTRAL_SCORE,
        }
    }

    pub fn compute(candles: &[Candle], config: &MomentumConfig) -> Self {
        if candles.len() < config.min_candles {
            return Self::neutral();
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let Some(&close) = closes.last() else {
            return Self::neutral();
        };

        let rsi = rsi(&closes, config.rsi_period).unwrap_or(NEUTRAL_SCORE);
        let macd = macd(&closes, config);
        let macd_score = macd.map_or(NEUTRAL_SCORE, |m| m.score);

        let ma50 = sma(&closes, config.ma_fast);
        let ma200 = sma(&closes, config.ma_slow);
        let ma_score = ma50.map_or(NEUTRAL_SCORE, |fast| ma_score(close, fast, ma200));

        let momentum_score = clamp_score((0.40 * rsi + 0.35 * macd_score + 0.25 * ma_score).round());

        Self {
            available: true,
            rsi,
            rsi_score: rsi,
            macd_hist: macd.map_or(0.0, |m| m.histogram),
            macd_score,
            ma50,
            ma200,
            ma_score,
            momentum_score,
        }
    }

    /// Momentum score when the reading is usable
    pub fn score(&self) -> Option<f64> {
        self.available.then_some(self.momentum_score)
    }
}

impl Default for MomentumReading {
    fn default() -> Self {
        Self::neutral()
    }
}
