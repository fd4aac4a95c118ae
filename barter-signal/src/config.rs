//! Signal engine tunables.
//!
//! Every threshold the pipeline uses lives here, grouped per stage. All groups deserialize with
//! `#[serde(default)]` so a partial JSON document only overrides what it names.

use crate::error::SignalError;
use serde::{Deserialize, Serialize};

/// Environment override for [`ClusterConfig::coverage`].
pub const ENV_COVERAGE: &str = "SIGNAL_COVERAGE";
/// Environment override for [`ClusterConfig::atr_multiplier`].
pub const ENV_CLUSTER_MULTIPLIER: &str = "SIGNAL_CLUSTER_MULTIPLIER";
/// Environment override for [`SmoothingConfig::persist_ticks`].
pub const ENV_PERSIST_TICKS: &str = "SIGNAL_PERSIST_TICKS";
/// Environment override for [`SmoothingConfig::conviction_smoothing`].
pub const ENV_SMOOTHING: &str = "SIGNAL_SMOOTHING";

/// Liquidity clustering and points-of-interest selection
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Bucket width = max(1, ATR × atr_multiplier)
    pub atr_multiplier: f64,
    /// Clusters weaker than this fraction of the strongest cluster are dropped
    pub min_strength_fraction: f64,
    /// Clusters whose midpoint is farther than ATR × distance_multiplier are dropped
    pub distance_multiplier: f64,
    /// Fraction of total clustered notional the POI set must cover
    pub coverage: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            atr_multiplier: 0.25,
            min_strength_fraction: 0.05,
            distance_multiplier: 3.0,
            coverage: 0.9,
        }
    }
}

/// ATR and return-volatility settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VolatilityConfig {
    pub atr_period: usize,
    /// Number of trailing log returns used by the realized (RMS) fallback
    pub realized_window: usize,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            realized_window: 30,
        }
    }
}

/// Liquidation zone ladder walk
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LiquidationConfig {
    /// First pass threshold as a fraction of the side total
    pub threshold_frac: f64,
    /// Second pass threshold as a fraction of the side total
    pub max_lookup_frac: f64,
    /// First pass reach from price, in ATRs
    pub distance_multiplier: f64,
    /// Second pass reach from price, in ATRs
    pub max_lookup_distance_multiplier: f64,
}

impl Default for LiquidationConfig {
    fn default() -> Self {
        Self {
            threshold_frac: 0.10,
            max_lookup_frac: 0.50,
            distance_multiplier: 3.0,
            max_lookup_distance_multiplier: 6.0,
        }
    }
}

/// RSI / MACD / moving-average settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MomentumConfig {
    pub min_candles: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// Trailing histogram window used to normalise the MACD score
    pub macd_norm_window: usize,
    pub ma_fast: usize,
    pub ma_slow: usize,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            min_candles: 50,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            macd_norm_window: 26,
            ma_fast: 50,
            ma_slow: 200,
        }
    }
}

/// CVD / LCI / MELA settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FlowConfig {
    pub cvd_lookback: usize,
    /// Multiplier applied to the normalised delta before clamping to [-1, 1]
    pub cvd_gain: f64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            cvd_lookback: 50,
            cvd_gain: 10.0,
        }
    }
}

/// Regime classification thresholds
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub stress_concentration: f64,
    pub stress_vol_ratio: f64,
    pub extreme_concentration: f64,
    pub weak_momentum_score: f64,
    pub weak_momentum_concentration: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            stress_concentration: 0.06,
            stress_vol_ratio: 0.01,
            extreme_concentration: 0.08,
            weak_momentum_score: 45.0,
            weak_momentum_concentration: 0.04,
        }
    }
}

/// Buy/sell score combination, suppression and decision rule
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConvictionConfig {
    pub dominance_weight: f64,
    pub talr_weight: f64,
    pub talr_window: usize,
    /// TALR bias magnitude at an all-up or all-down window
    pub talr_cap: f64,
    pub proximity_weight: f64,
    pub proximity_cap: f64,
    pub proximity_factor_cap: f64,
    pub mass_weight: f64,
    pub mass_cap: f64,
    /// Weight of each futures component (funding, long/short) against the OI strength
    pub futures_component_weight: f64,
    pub futures_strength_cap: f64,
    /// Strength used when open interest is missing
    pub futures_base_strength: f64,
    /// Funding rate at which the funding component saturates
    pub funding_rate_scale: f64,
    /// Long/short ratio distance from 1.0 at which the ratio component saturates
    pub long_short_scale: f64,
    pub momentum_scale: f64,
    pub momentum_cap: f64,
    pub cvd_scale: f64,
    pub lci_scale: f64,
    pub mela_scale: f64,
    pub flow_cap: f64,
    pub cross_asset_weight: f64,
    pub cross_asset_cap: f64,
    pub cross_asset_proxy_scale: f64,
    pub cross_asset_proxy_cap: f64,
    pub suppression_cvd_threshold: f64,
    pub suppression_buy_cap: f64,
    pub suppression_min_penalty: f64,
    pub suppression_penalty_per_cvd_point: f64,
    pub suppression_small_penalty: f64,
    /// Share of the suppression penalty credited to the sell score
    pub suppression_sell_credit: f64,
    pub decision_gap: f64,
    pub min_signal_score: f64,
}

impl Default for ConvictionConfig {
    fn default() -> Self {
        Self {
            dominance_weight: 0.35,
            talr_weight: 0.5,
            talr_window: 20,
            talr_cap: 20.0,
            proximity_weight: 0.5,
            proximity_cap: 20.0,
            proximity_factor_cap: 5.0,
            mass_weight: 0.4,
            mass_cap: 20.0,
            futures_component_weight: 0.25,
            futures_strength_cap: 30.0,
            futures_base_strength: 10.0,
            funding_rate_scale: 0.0005,
            long_short_scale: 0.5,
            momentum_scale: 0.4,
            momentum_cap: 10.0,
            cvd_scale: 0.2,
            lci_scale: 0.2,
            mela_scale: 0.2,
            flow_cap: 10.0,
            cross_asset_weight: 1.5,
            cross_asset_cap: 8.0,
            cross_asset_proxy_scale: 10.0,
            cross_asset_proxy_cap: 5.0,
            suppression_cvd_threshold: 40.0,
            suppression_buy_cap: 55.0,
            suppression_min_penalty: 15.0,
            suppression_penalty_per_cvd_point: 1.0,
            suppression_small_penalty: 8.0,
            suppression_sell_credit: 0.5,
            decision_gap: 8.0,
            min_signal_score: 60.0,
        }
    }
}

/// Anti-oscillation layer
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Score gaps below this force HOLD
    pub deadband: f64,
    /// Consecutive ticks a directional call must repeat before it is emitted
    pub persist_ticks: u32,
    /// BUY requires a momentum score at or above this
    pub momentum_confirm_buy: f64,
    /// SELL requires a momentum score at or below this
    pub momentum_confirm_sell: f64,
    /// Weight of the previous tick's conviction
    pub conviction_smoothing: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            deadband: 12.0,
            persist_ticks: 2,
            momentum_confirm_buy: 45.0,
            momentum_confirm_sell: 55.0,
            conviction_smoothing: 0.35,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalConfig {
    pub cluster: ClusterConfig,
    pub volatility: VolatilityConfig,
    pub liquidation: LiquidationConfig,
    pub momentum: MomentumConfig,
    pub flow: FlowConfig,
    pub regime: RegimeConfig,
    pub conviction: ConvictionConfig,
    pub smoothing: SmoothingConfig,
}

impl SignalConfig {
    /// Set POI coverage
    pub fn with_coverage(mut self, coverage: f64) -> Self {
        self.cluster.coverage = coverage;
        self
    }

    /// Set cluster bucket width multiplier
    pub fn with_cluster_multiplier(mut self, multiplier: f64) -> Self {
        self.cluster.atr_multiplier = multiplier;
        self
    }

    /// Set trend persistence requirement
    pub fn with_persist_ticks(mut self, ticks: u32) -> Self {
        self.smoothing.persist_ticks = ticks;
        self
    }

    /// Set conviction smoothing factor
    pub fn with_smoothing(mut self, factor: f64) -> Self {
        self.smoothing.conviction_smoothing = factor;
        self
    }

    /// Apply `SIGNAL_*` environment overrides. Unparsable values are ignored.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_f64 = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());

        if let Some(coverage) = parse_f64(ENV_COVERAGE) {
            self.cluster.coverage = coverage;
        }
        if let Some(multiplier) = parse_f64(ENV_CLUSTER_MULTIPLIER) {
            self.cluster.atr_multiplier = multiplier;
        }
        if let Some(ticks) = lookup(ENV_PERSIST_TICKS).and_then(|v| v.trim().parse().ok()) {
            self.smoothing.persist_ticks = ticks;
        }
        if let Some(factor) = parse_f64(ENV_SMOOTHING) {
            self.smoothing.conviction_smoothing = factor;
        }
        self
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), SignalError> {
        let invalid = |reason: &str| Err(SignalError::InvalidConfig(reason.to_string()));

        if !(self.cluster.coverage > 0.0 && self.cluster.coverage <= 1.0) {
            return invalid("cluster.coverage must be in (0, 1]");
        }
        if !(self.cluster.atr_multiplier > 0.0) || !(self.cluster.distance_multiplier > 0.0) {
            return invalid("cluster multipliers must be positive");
        }
        if !(0.0..=1.0).contains(&self.cluster.min_strength_fraction) {
            return invalid("cluster.min_strength_fraction must be in [0, 1]");
        }
        if self.volatility.atr_period == 0 || self.volatility.realized_window == 0 {
            return invalid("volatility periods must be non-zero");
        }
        let liquidation = &self.liquidation;
        if !(liquidation.threshold_frac > 0.0
            && liquidation.threshold_frac <= liquidation.max_lookup_frac
            && liquidation.max_lookup_frac <= 1.0)
        {
            return invalid("liquidation thresholds must satisfy 0 < threshold_frac <= max_lookup_frac <= 1");
        }
        if !(liquidation.distance_multiplier > 0.0
            && liquidation.max_lookup_distance_multiplier >= liquidation.distance_multiplier)
        {
            return invalid("liquidation reach must be positive and widen on the second pass");
        }
        let momentum = &self.momentum;
        if momentum.rsi_period == 0
            || momentum.macd_fast == 0
            || momentum.macd_signal == 0
            || momentum.macd_norm_window == 0
            || momentum.ma_fast == 0
            || momentum.macd_fast >= momentum.macd_slow
            || momentum.ma_fast >= momentum.ma_slow
        {
            return invalid("momentum periods must be non-zero with fast < slow");
        }
        if self.flow.cvd_lookback == 0 || self.conviction.talr_window == 0 {
            return invalid("flow lookbacks must be non-zero");
        }
        if !(0.0..1.0).contains(&self.smoothing.conviction_smoothing) {
            return invalid("smoothing.conviction_smoothing must be in [0, 1)");
        }
        if self.smoothing.deadband < 0.0 || self.conviction.decision_gap < 0.0 {
            return invalid("deadband and decision gap must be non-negative");
        }
        Ok(())
    }
}
