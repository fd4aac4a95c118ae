//! End-to-end signal pipeline and per-symbol state registry.

use crate::{
    aggregation::{
        ExchangeClusters, ExchangeShare, LiquidityBook, LiquidityDominance, PointsOfInterest,
        build_clusters, cluster_width, exchange_shares, extract_poi, filter_clusters,
    },
    config::SignalConfig,
    conviction::{ConvictionEngine, ConvictionInputs, ConvictionResult, EngineState, down_close_ratio},
    error::SignalError,
    flow::FlowReading,
    liquidation::LiquidationZones,
    momentum::MomentumReading,
    regime::{Regime, RegimeInputs, classify},
    types::MarketInput,
    volatility::VolatilityProfile,
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Complete typed output of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSnapshot {
    pub symbol: String,
    pub time: Option<DateTime<Utc>>,
    pub current_price: f64,
    pub volatility: VolatilityProfile,
    pub cluster_width: f64,
    pub bid_poi: PointsOfInterest,
    pub ask_poi: PointsOfInterest,
    pub dominance: LiquidityDominance,
    pub exchange_shares: Vec<ExchangeShare>,
    pub zones: LiquidationZones,
    pub momentum: MomentumReading,
    pub flow: FlowReading,
    pub regime: Regime,
    pub conviction: ConvictionResult,
}

/// Explicit price, else the combined book mid, else the last primary close.
pub fn resolve_price(input: &MarketInput, combined: &LiquidityBook) -> Result<f64, SignalError> {
    let valid = |price: &f64| price.is_finite() && *price > 0.0;

    input
        .current_price
        .filter(valid)
        .or_else(|| combined.mid_price().filter(valid))
        .or_else(|| input.candles.primary().last().map(|c| c.close).filter(valid))
        .ok_or(SignalError::PriceUnavailable)
}

#[derive(Debug, Clone)]
pub struct SignalEngine {
    config: SignalConfig,
    conviction: ConvictionEngine,
}

impl SignalEngine {
    pub fn new(config: SignalConfig) -> Result<Self, SignalError> {
        config.validate()?;
        let conviction = ConvictionEngine::new(config.conviction.clone(), config.smoothing.clone());
        Ok(Self { config, conviction })
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Run every stage for one symbol, reading and updating its `state`.
    ///
    /// Fails only when no price, no primary ATR or no liquidity clusters are available; the
    /// state is left untouched in that case.
    pub fn evaluate(
        &self,
        state: &mut EngineState,
        input: &MarketInput,
    ) -> Result<SignalSnapshot, SignalError> {
        let config = &self.config;

        let books: Vec<LiquidityBook> = input.books.iter().map(LiquidityBook::from_snapshot).collect();
        let combined = LiquidityBook::combined(&input.books);

        let current_price = resolve_price(input, &combined)?;
        let volatility = VolatilityProfile::compute(&input.candles, current_price, &config.volatility)?;
        let atr = volatility.atr();
        let width = cluster_width(atr, config.cluster.atr_multiplier);

        let bid_clusters = filter_clusters(
            build_clusters(&combined.bids, width),
            current_price,
            atr,
            &config.cluster,
        );
        let ask_clusters = filter_clusters(
            build_clusters(&combined.asks, width),
            current_price,
            atr,
            &config.cluster,
        );
        if bid_clusters.is_empty() && ask_clusters.is_empty() {
            return Err(SignalError::ClustersEmpty);
        }

        let bid_poi = extract_poi(&bid_clusters, config.cluster.coverage);
        let ask_poi = extract_poi(&ask_clusters, config.cluster.coverage);
        let dominance = LiquidityDominance::from_poi(&bid_poi, &ask_poi);

        let zones = LiquidationZones::locate(
            &combined,
            &bid_clusters,
            &ask_clusters,
            current_price,
            atr,
            &config.liquidation,
        );

        let primary = input.candles.primary();
        let momentum = MomentumReading::compute(primary, &config.momentum);
        if !momentum.available {
            debug!(symbol = %input.symbol, candles = primary.len(), "momentum unavailable, using neutral scores");
        }

        let exchanges: Vec<ExchangeClusters> = books
            .iter()
            .map(|book| ExchangeClusters::build(book, width, current_price, atr, &config.cluster))
            .collect();
        let flow = FlowReading::compute(
            primary,
            &combined,
            &exchanges,
            current_price,
            atr,
            width,
            &config.flow,
        );

        let regime = classify(
            &RegimeInputs {
                atr,
                current_price,
                concentration: flow.lci.ratio.unwrap_or(0.0),
                momentum_score: momentum.momentum_score,
            },
            &config.regime,
        );

        let conviction_inputs = ConvictionInputs {
            dominance,
            down_close_ratio: down_close_ratio(primary, config.conviction.talr_window),
            support_distance: zones.support_distance(),
            resistance_distance: zones.resistance_distance(),
            proximity_reach: atr * config.cluster.distance_multiplier,
            bid_mass: combined.bid_total(),
            ask_mass: combined.ask_total(),
            futures: input.futures,
            momentum_score: momentum.score(),
            flow,
            cross_asset_modifier: input.cross_asset_modifier,
            regime,
        };
        let conviction = self.conviction.evaluate(state, &conviction_inputs);

        info!(
            symbol = %input.symbol,
            price = current_price,
            atr,
            signal = %conviction.signal,
            raw_signal = %conviction.raw_signal,
            conviction = conviction.conviction,
            buy_score = conviction.buy_score,
            sell_score = conviction.sell_score,
            regime = ?regime,
            "signal evaluated"
        );

        Ok(SignalSnapshot {
            symbol: input.symbol.clone(),
            time: input.time,
            current_price,
            volatility,
            cluster_width: width,
            bid_poi,
            ask_poi,
            dominance,
            exchange_shares: exchange_shares(&books),
            zones,
            momentum,
            flow,
            regime,
            conviction,
        })
    }
}

/// Independent [`EngineState`] per symbol.
///
/// Evaluations for one symbol are serialised on that symbol's lock; different symbols never
/// contend beyond the brief map lookup.
#[derive(Debug, Default)]
pub struct StateRegistry {
    states: Mutex<FnvHashMap<String, Arc<Mutex<EngineState>>>>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// State handle for `symbol`, created on first use.
    pub fn state(&self, symbol: &str) -> Arc<Mutex<EngineState>> {
        let mut states = self.states.lock();
        match states.get(symbol) {
            Some(state) => Arc::clone(state),
            None => {
                let state = Arc::new(Mutex::new(EngineState::default()));
                states.insert(symbol.to_string(), Arc::clone(&state));
                state
            }
        }
    }

    pub fn evaluate(
        &self,
        engine: &SignalEngine,
        input: &MarketInput,
    ) -> Result<SignalSnapshot, SignalError> {
        let state = self.state(&input.symbol);
        let mut state = state.lock();
        engine.evaluate(&mut state, input)
    }

    /// Copy of the current state for `symbol`, if it has been evaluated
    pub fn snapshot(&self, symbol: &str) -> Option<EngineState> {
        let state = self.states.lock().get(symbol).cloned()?;
        let state = state.lock().clone();
        Some(state)
    }

    pub fn reset(&self, symbol: &str) -> bool {
        self.states.lock().remove(symbol).is_some()
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }
}
