/// Core input and output records for the signal engine
///
/// Inputs arrive already parsed from the exchange collectors: raw order-book levels keep the
/// exchange's `Decimal` precision, candles are plain `f64` OHLCV bars.
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Price/quantity level in an order book
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Level {
    /// Price level
    pub price: Decimal,
    /// Quantity at this level (base units)
    pub amount: Decimal,
}

impl Level {
    pub fn new(price: Decimal, amount: Decimal) -> Self {
        Self { price, amount }
    }

    /// A level is usable only with strictly positive price and size.
    pub fn is_valid(&self) -> bool {
        self.price > Decimal::ZERO && self.amount > Decimal::ZERO
    }

    /// USD notional of the level, `None` on overflow.
    pub fn notional(&self) -> Option<Decimal> {
        self.price.checked_mul(self.amount)
    }
}

/// Depth snapshot from a single exchange
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OrderBookSnapshot {
    /// Exchange name (e.g., "BinanceFuturesUsd", "Okx")
    pub exchange: String,
    #[serde(default)]
    pub bids: Vec<Level>,
    #[serde(default)]
    pub asks: Vec<Level>,
}

/// One OHLCV bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct Candle {
    /// Bar open time, when the collector provides it
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time: None,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn is_up(&self) -> bool {
        self.close > self.open
    }

    pub fn is_down(&self) -> bool {
        self.close < self.open
    }
}

/// Candle interval tracked by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Timeframe {
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "5m")]
    M5,
}

impl Timeframe {
    /// Secondary timeframes, reported but never used for the signal decision
    pub const SECONDARY: [Timeframe; 3] = [Timeframe::H1, Timeframe::M15, Timeframe::M5];

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::H4 => "4h",
            Timeframe::H1 => "1h",
            Timeframe::M15 => "15m",
            Timeframe::M5 => "5m",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Time-ascending candle series per timeframe. 4h is the authoritative series.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CandleSeries {
    #[serde(rename = "4h")]
    pub h4: Vec<Candle>,
    #[serde(rename = "1h")]
    pub h1: Vec<Candle>,
    #[serde(rename = "15m")]
    pub m15: Vec<Candle>,
    #[serde(rename = "5m")]
    pub m5: Vec<Candle>,
}

impl CandleSeries {
    pub fn get(&self, timeframe: Timeframe) -> &[Candle] {
        match timeframe {
            Timeframe::H4 => &self.h4,
            Timeframe::H1 => &self.h1,
            Timeframe::M15 => &self.m15,
            Timeframe::M5 => &self.m5,
        }
    }

    pub fn primary(&self) -> &[Candle] {
        &self.h4
    }
}

/// Perpetual futures context. Every field is optional; a missing field zeroes its bias term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FuturesMetrics {
    pub open_interest_usd: Option<f64>,
    pub funding_rate: Option<f64>,
    /// Taker long/short ratio (> 1.0 = aggressive longs dominate)
    pub long_short_ratio: Option<f64>,
}

/// Everything the engine needs for one evaluation of one symbol
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MarketInput {
    pub symbol: String,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    /// Explicit last price; falls back to book mid, then last 4h close
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub books: Vec<OrderBookSnapshot>,
    #[serde(default)]
    pub candles: CandleSeries,
    #[serde(default)]
    pub futures: Option<FuturesMetrics>,
    /// External cross-asset modifier in percent
    #[serde(default)]
    pub cross_asset_modifier: Option<f64>,
}

/// Emitted trading signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        }
    }

    pub fn is_directional(&self) -> bool {
        !matches!(self, Signal::Hold)
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
