/// Barter Signal - liquidity driven conviction engine
///
/// Derives a BUY/SELL/HOLD signal with a 0-100 conviction score for one crypto asset per
/// evaluation, from multi-exchange order books, multi-timeframe candles and optional futures
/// context.
///
/// Pipeline stages:
/// - Liquidity aggregation, clustering and points-of-interest extraction
/// - Multi-timeframe volatility (4h is authoritative)
/// - Liquidation zone location
/// - Momentum (RSI, MACD, moving averages)
/// - Flow metrics (CVD, LCI, MELA)
/// - Regime classification
/// - Conviction scoring with anti-oscillation smoothing
///
/// Smoothing state is an explicit [`EngineState`] per symbol, threaded through each call or
/// held by a [`StateRegistry`].
pub mod aggregation;
pub mod config;
pub mod conviction;
pub mod engine;
pub mod error;
pub mod flow;
pub mod liquidation;
pub mod momentum;
pub mod regime;
pub mod types;
pub mod volatility;

// Re-export commonly used types for convenience
pub use config::SignalConfig;
pub use conviction::{ConvictionResult, EngineState};
pub use engine::{SignalEngine, SignalSnapshot, StateRegistry};
pub use error::SignalError;
pub use regime::Regime;
pub use types::{
    Candle, CandleSeries, FuturesMetrics, Level, MarketInput, OrderBookSnapshot, Signal, Timeframe,
};
