/// Order-book liquidity aggregation
///
/// Merges raw exchange levels into USD-notional price levels (per exchange and combined),
/// buckets them into fixed-width clusters and selects the points-of-interest set: the
/// strongest clusters covering a target fraction of total clustered notional.
use crate::{
    config::ClusterConfig,
    types::{Level, OrderBookSnapshot},
};
use itertools::Itertools;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::Serialize;
use std::collections::BTreeMap;

/// Exchange label used for the cross-exchange book.
pub const COMBINED_EXCHANGE: &str = "combined";

/// USD notional resting at one price
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceLevel {
    pub price: f64,
    pub notional_usd: f64,
}

/// Merge raw levels into price-ascending notional levels.
///
/// Non-positive prices or sizes are dropped; duplicate prices merge by summing notional.
pub fn aggregate_levels<'a, I>(levels: I) -> Vec<PriceLevel>
where
    I: IntoIterator<Item = &'a Level>,
{
    let mut merged: BTreeMap<Decimal, Decimal> = BTreeMap::new();

    for level in levels {
        if !level.is_valid() {
            continue;
        }
        let Some(notional) = level.notional() else {
            continue;
        };
        let entry = merged.entry(level.price).or_insert(Decimal::ZERO);
        *entry = entry.checked_add(notional).unwrap_or(Decimal::MAX);
    }

    merged
        .into_iter()
        .filter_map(|(price, notional)| {
            Some(PriceLevel {
                price: price.to_f64()?,
                notional_usd: notional.to_f64()?,
            })
        })
        .collect()
}

/// Bid and ask notional levels for one exchange (or the combined book)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiquidityBook {
    pub exchange: String,
    /// Price-ascending
    pub bids: Vec<PriceLevel>,
    /// Price-ascending
    pub asks: Vec<PriceLevel>,
}

impl LiquidityBook {
    pub fn from_snapshot(snapshot: &OrderBookSnapshot) -> Self {
        Self {
            exchange: snapshot.exchange.clone(),
            bids: aggregate_levels(&snapshot.bids),
            asks: aggregate_levels(&snapshot.asks),
        }
    }

    /// Merge every exchange's raw levels into one book.
    pub fn combined(snapshots: &[OrderBookSnapshot]) -> Self {
        Self {
            exchange: COMBINED_EXCHANGE.to_string(),
            bids: aggregate_levels(snapshots.iter().flat_map(|s| &s.bids)),
            asks: aggregate_levels(snapshots.iter().flat_map(|s| &s.asks)),
        }
    }

    pub fn bid_total(&self) -> f64 {
        self.bids.iter().map(|l| l.notional_usd).sum()
    }

    pub fn ask_total(&self) -> f64 {
        self.asks.iter().map(|l| l.notional_usd).sum()
    }

    pub fn total(&self) -> f64 {
        self.bid_total() + self.ask_total()
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.last().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// Mid price, only for an uncrossed book
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if bid > 0.0 && ask >= bid => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    /// (bid, ask) notional resting within `reach` of `price`
    pub fn notional_within(&self, price: f64, reach: f64) -> (f64, f64) {
        let within = |levels: &[PriceLevel]| -> f64 {
            levels
                .iter()
                .filter(|l| (l.price - price).abs() <= reach)
                .map(|l| l.notional_usd)
                .sum()
        };
        (within(&self.bids), within(&self.asks))
    }
}

/// Fixed-width price bucket of aggregated liquidity
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LiquidityCluster {
    pub low: f64,
    pub high: f64,
    pub notional_usd: f64,
    pub level_count: usize,
}

impl LiquidityCluster {
    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }
}

/// Cluster bucket width: ATR-scaled, never narrower than one price unit.
pub fn cluster_width(atr: f64, multiplier: f64) -> f64 {
    let width = atr * multiplier;
    if width.is_finite() { width.max(1.0) } else { 1.0 }
}

/// Bucket levels into `width`-wide clusters, sorted by descending notional.
///
/// Ties break on ascending price so the order is deterministic.
pub fn build_clusters(levels: &[PriceLevel], width: f64) -> Vec<LiquidityCluster> {
    let mut buckets: BTreeMap<i64, LiquidityCluster> = BTreeMap::new();

    for level in levels {
        let bucket = (level.price / width).floor() as i64;
        let cluster = buckets.entry(bucket).or_insert_with(|| LiquidityCluster {
            low: bucket as f64 * width,
            high: (bucket + 1) as f64 * width,
            notional_usd: 0.0,
            level_count: 0,
        });
        cluster.notional_usd += level.notional_usd;
        cluster.level_count += 1;
    }

    buckets
        .into_values()
        .sorted_by(|a, b| {
            b.notional_usd
                .total_cmp(&a.notional_usd)
                .then(a.low.total_cmp(&b.low))
        })
        .collect()
}

/// Drop clusters too weak relative to the strongest, or too far from price.
pub fn filter_clusters(
    clusters: Vec<LiquidityCluster>,
    current_price: f64,
    atr: f64,
    config: &ClusterConfig,
) -> Vec<LiquidityCluster> {
    let strongest = clusters
        .iter()
        .map(|c| c.notional_usd)
        .fold(0.0_f64, f64::max);
    let min_notional = strongest * config.min_strength_fraction;
    let reach = atr * config.distance_multiplier;

    clusters
        .into_iter()
        .filter(|c| {
            c.notional_usd >= min_notional && (c.midpoint() - current_price).abs() <= reach
        })
        .collect()
}

/// Minimal set of strongest clusters covering `coverage` of total notional
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PointsOfInterest {
    pub total_notional: f64,
    pub target_notional: f64,
    pub clusters: Vec<LiquidityCluster>,
}

impl PointsOfInterest {
    /// Notional of the admitted clusters
    pub fn notional(&self) -> f64 {
        self.clusters.iter().map(|c| c.notional_usd).sum()
    }
}

/// Greedily admit clusters in descending-notional order until `coverage × total` is reached.
pub fn extract_poi(clusters: &[LiquidityCluster], coverage: f64) -> PointsOfInterest {
    let total_notional: f64 = clusters.iter().map(|c| c.notional_usd).sum();
    let target_notional = total_notional * coverage;

    let mut cumulative = 0.0;
    let admitted = clusters
        .iter()
        .copied()
        .sorted_by(|a, b| {
            b.notional_usd
                .total_cmp(&a.notional_usd)
                .then(a.low.total_cmp(&b.low))
        })
        .take_while(|cluster| {
            if cumulative >= target_notional {
                return false;
            }
            cumulative += cluster.notional_usd;
            true
        })
        .collect();

    PointsOfInterest {
        total_notional,
        target_notional,
        clusters: admitted,
    }
}

/// Filtered bid/ask clusters for one exchange, used for cross-exchange agreement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeClusters {
    pub exchange: String,
    pub bids: Vec<LiquidityCluster>,
    pub asks: Vec<LiquidityCluster>,
}

impl ExchangeClusters {
    pub fn build(
        book: &LiquidityBook,
        width: f64,
        current_price: f64,
        atr: f64,
        config: &ClusterConfig,
    ) -> Self {
        Self {
            exchange: book.exchange.clone(),
            bids: filter_clusters(build_clusters(&book.bids, width), current_price, atr, config),
            asks: filter_clusters(build_clusters(&book.asks, width), current_price, atr, config),
        }
    }
}

/// Buy/sell liquidity dominance from the POI totals (percent, sums to 100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LiquidityDominance {
    pub buy_pct: f64,
    pub sell_pct: f64,
}

impl LiquidityDominance {
    pub fn from_poi(bids: &PointsOfInterest, asks: &PointsOfInterest) -> Self {
        let bid = bids.notional();
        let ask = asks.notional();
        let total = bid + ask;
        if total > 0.0 {
            let buy_pct = bid / total * 100.0;
            Self {
                buy_pct,
                sell_pct: 100.0 - buy_pct,
            }
        } else {
            Self {
                buy_pct: 50.0,
                sell_pct: 50.0,
            }
        }
    }

    /// Signed dominance deviation from balance, -50..=50
    pub fn bias(&self) -> f64 {
        self.buy_pct - 50.0
    }

    /// +1.0 when bids dominate, -1.0 when asks dominate, 0.0 on an exact tie
    pub fn direction(&self) -> f64 {
        if self.buy_pct > self.sell_pct {
            1.0
        } else if self.buy_pct < self.sell_pct {
            -1.0
        } else {
            0.0
        }
    }
}

/// Share of combined notional contributed by one exchange
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeShare {
    pub exchange: String,
    pub share_pct: f64,
}

/// Per-exchange share of total notional, largest first.
pub fn exchange_shares(books: &[LiquidityBook]) -> Vec<ExchangeShare> {
    let total: f64 = books.iter().map(LiquidityBook::total).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    books
        .iter()
        .map(|book| ExchangeShare {
            exchange: book.exchange.clone(),
            share_pct: book.total() / total * 100.0,
        })
        .sorted_by(|a, b| b.share_pct.total_cmp(&a.share_pct))
        .collect()
}
