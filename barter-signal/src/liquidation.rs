//! Liquidation zone location.
//!
//! Walks the cumulative liquidity ladder outward from price on each side and returns the
//! nearest level where accumulated notional crosses a fraction of the side total, bounded by an
//! ATR-scaled reach. A second pass uses a higher threshold over a wider reach; if neither
//! crosses, the strongest cluster on that side stands in as the "max-pain" level.

use crate::{
    aggregation::{LiquidityBook, LiquidityCluster, PriceLevel},
    config::LiquidationConfig,
};
use serde::Serialize;
use tracing::debug;

/// Which pass produced a zone
#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThresholdKind {
    /// `threshold_frac × side_total`
    Low,
    /// `max_lookup_frac × side_total`
    High,
    /// Strongest cluster fallback, no threshold crossed
    MaxPain,
}

#[derive(Clone, Debug, Copy, PartialEq, Serialize)]
pub struct LiquidationZone {
    pub price: f64,
    pub accumulated_notional: f64,
    pub distance_from_price: f64,
    pub threshold_crossed: ThresholdKind,
}

fn walk<'a, I>(
    ladder: I,
    current_price: f64,
    reach: f64,
    threshold: f64,
    kind: ThresholdKind,
) -> Option<LiquidationZone>
where
    I: Iterator<Item = &'a PriceLevel>,
{
    let mut accumulated = 0.0;
    for level in ladder {
        let distance = (level.price - current_price).abs();
        if distance > reach {
            break;
        }
        accumulated += level.notional_usd;
        if accumulated >= threshold {
            return Some(LiquidationZone {
                price: level.price,
                accumulated_notional: accumulated,
                distance_from_price: distance,
                threshold_crossed: kind,
            });
        }
    }
    None
}

fn locate<'a, F, I>(
    ladder: F,
    current_price: f64,
    atr: f64,
    side_total: f64,
    config: &LiquidationConfig,
) -> Option<LiquidationZone>
where
    F: Fn() -> I,
    I: Iterator<Item = &'a PriceLevel>,
{
    if side_total <= 0.0 || !current_price.is_finite() {
        return None;
    }

    [
        (config.threshold_frac, config.distance_multiplier, ThresholdKind::Low),
        (config.max_lookup_frac, config.max_lookup_distance_multiplier, ThresholdKind::High),
    ]
    .into_iter()
    .find_map(|(frac, multiplier, kind)| {
        walk(ladder(), current_price, atr * multiplier, frac * side_total, kind)
    })
}

fn ascending(levels: &[PriceLevel]) -> Vec<PriceLevel> {
    let mut ladder = levels.to_vec();
    ladder.sort_by(|a, b| a.price.total_cmp(&b.price));
    ladder
}

/// Nearest bid level below price where accumulated notional crosses the threshold.
pub fn locate_support(
    bids: &[PriceLevel],
    current_price: f64,
    atr: f64,
    side_total: f64,
    config: &LiquidationConfig,
) -> Option<LiquidationZone> {
    let ladder = ascending(bids);
    locate(
        || ladder.iter().rev().filter(|l| l.price < current_price),
        current_price,
        atr,
        side_total,
        config,
    )
}

/// Nearest ask level above price where accumulated notional crosses the threshold.
pub fn locate_resistance(
    asks: &[PriceLevel],
    current_price: f64,
    atr: f64,
    side_total: f64,
    config: &LiquidationConfig,
) -> Option<LiquidationZone> {
    let ladder = ascending(asks);
    locate(
        || ladder.iter().filter(|l| l.price > current_price),
        current_price,
        atr,
        side_total,
        config,
    )
}

/// Strongest cluster strictly on one side of price
pub fn max_pain_proxy(
    clusters: &[LiquidityCluster],
    current_price: f64,
    below: bool,
) -> Option<LiquidationZone> {
    clusters
        .iter()
        .filter(|c| {
            if below {
                c.midpoint() < current_price
            } else {
                c.midpoint() > current_price
            }
        })
        .max_by(|a, b| a.notional_usd.total_cmp(&b.notional_usd))
        .map(|c| LiquidationZone {
            price: c.midpoint(),
            accumulated_notional: c.notional_usd,
            distance_from_price: (c.midpoint() - current_price).abs(),
            threshold_crossed: ThresholdKind::MaxPain,
        })
}

/// Support below and resistance above the current price
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LiquidationZones {
    pub support: Option<LiquidationZone>,
    pub resistance: Option<LiquidationZone>,
}

impl LiquidationZones {
    /// Locate both zones on the combined book, falling back to the strongest cluster per side.
    pub fn locate(
        combined: &LiquidityBook,
        bid_clusters: &[LiquidityCluster],
        ask_clusters: &[LiquidityCluster],
        current_price: f64,
        atr: f64,
        config: &LiquidationConfig,
    ) -> Self {
        let support = locate_support(
            &combined.bids,
            current_price,
            atr,
            combined.bid_total(),
            config,
        )
        .or_else(|| {
            let proxy = max_pain_proxy(bid_clusters, current_price, true);
            debug!(found = proxy.is_some(), "support threshold not crossed, using max-pain proxy");
            proxy
        });

        let resistance = locate_resistance(
            &combined.asks,
            current_price,
            atr,
            combined.ask_total(),
            config,
        )
        .or_else(|| {
            let proxy = max_pain_proxy(ask_clusters, current_price, false);
            debug!(found = proxy.is_some(), "resistance threshold not crossed, using max-pain proxy");
            proxy
        });

        Self {
            support,
            resistance,
        }
    }

    pub fn support_distance(&self) -> Option<f64> {
        self.support.map(|z| z.distance_from_price)
    }

    pub fn resistance_distance(&self) -> Option<f64> {
        self.resistance.map(|z| z.distance_from_price)
    }
}
