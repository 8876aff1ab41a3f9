//! Cross-provider arbitrage detection.
//!
//! Groups normalized quotes by GPU model and evaluates the extremal
//! (cheapest vs most-expensive) pair per group against configurable
//! significance thresholds. Opportunities are recomputed fresh on every
//! pass — there is no mutable opportunity state to reconcile.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::debug;

use crate::config::ArbitrageConfig;
use crate::normalize::Normalizer;
use crate::types::{NormalizedQuote, Quote};

/// Average hours in a month (24 * 365 / 12, rounded).
const HOURS_PER_MONTH: Decimal = dec!(730);
/// Hours in a year.
const HOURS_PER_YEAR: Decimal = dec!(8760);

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A threshold-qualifying price spread for one GPU model across providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub gpu_model: String,
    pub cheapest: NormalizedQuote,
    pub most_expensive: NormalizedQuote,
    /// Absolute hourly spread in USD.
    pub price_difference: Decimal,
    /// Spread relative to the most expensive offer, in percent.
    pub percentage_savings: f64,
    /// Every contributing quote, sorted by price ascending.
    pub all_quotes: Vec<NormalizedQuote>,
}

impl Opportunity {
    /// Number of distinct providers offering this GPU.
    pub fn providers_offering(&self) -> usize {
        self.all_quotes
            .iter()
            .map(|q| q.quote.provider.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Savings projected over longer rental horizons, assuming 24/7 use.
    pub fn savings_projection(&self) -> SavingsProjection {
        SavingsProjection {
            hourly: self.price_difference,
            monthly: self.price_difference * HOURS_PER_MONTH,
            annual: self.price_difference * HOURS_PER_YEAR,
        }
    }
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ${}/hr vs {} ${}/hr, save {:.1}%",
            self.gpu_model,
            self.cheapest.quote.provider,
            self.cheapest.quote.price_per_hour,
            self.most_expensive.quote.provider,
            self.most_expensive.quote.price_per_hour,
            self.percentage_savings,
        )
    }
}

/// Hourly spread extrapolated to month and year horizons.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SavingsProjection {
    pub hourly: Decimal,
    pub monthly: Decimal,
    pub annual: Decimal,
}

/// Intra-provider price spread for one GPU across that provider's own
/// regions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionalSpread {
    pub provider: String,
    pub gpu_model: String,
    pub cheapest_region: String,
    pub cheapest_price: Decimal,
    pub most_expensive_region: String,
    pub most_expensive_price: Decimal,
    pub price_difference: Decimal,
    pub percentage_savings: f64,
}

/// Best/worst breakdown for every provider offering one GPU model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderComparison {
    pub gpu_model: String,
    pub tflops: Option<f64>,
    pub providers_compared: usize,
    pub best: NormalizedQuote,
    pub worst: NormalizedQuote,
    pub price_difference: Decimal,
    pub price_difference_percent: f64,
    /// All offers ranked by cost-performance score, best first.
    pub all_options: Vec<NormalizedQuote>,
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Significance thresholds for surfacing an opportunity.
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    /// Minimum absolute spread in USD/hour.
    pub min_price_difference: Decimal,
    /// Minimum percentage savings relative to the most expensive offer.
    pub min_percentage_savings: f64,
    /// Minimum distinct providers offering the same GPU.
    pub min_providers: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_price_difference: dec!(0.50),
            min_percentage_savings: 10.0,
            min_providers: 2,
        }
    }
}

impl From<&ArbitrageConfig> for DetectorConfig {
    fn from(cfg: &ArbitrageConfig) -> Self {
        Self {
            min_price_difference: Decimal::from_f64(cfg.min_price_difference)
                .unwrap_or_else(|| dec!(0.50)),
            min_percentage_savings: cfg.min_percentage_savings,
            min_providers: cfg.min_providers,
        }
    }
}

/// Detects cost arbitrage opportunities across GPU providers.
pub struct ArbitrageDetector {
    config: DetectorConfig,
    normalizer: Normalizer,
}

impl ArbitrageDetector {
    pub fn new(config: DetectorConfig, normalizer: Normalizer) -> Self {
        Self { config, normalizer }
    }

    /// Detect all opportunities in the given quotes, ranked by percentage
    /// savings descending.
    ///
    /// Grouping uses a `BTreeMap` and the final ranking a stable sort, so
    /// two passes over the same input always produce the same ordered list.
    pub fn detect(&self, quotes: &[Quote]) -> Vec<Opportunity> {
        let normalized = self.normalizer.normalize_batch(quotes);

        let mut by_model: BTreeMap<String, Vec<NormalizedQuote>> = BTreeMap::new();
        for nq in normalized {
            if nq.normalized {
                by_model.entry(nq.quote.gpu_model.clone()).or_default().push(nq);
            }
        }

        let mut opportunities = Vec::new();
        for (gpu_model, mut group) in by_model {
            let distinct_providers: HashSet<&str> =
                group.iter().map(|q| q.quote.provider.as_str()).collect();
            if distinct_providers.len() < self.config.min_providers {
                continue;
            }

            group.sort_by(|a, b| a.quote.price_per_hour.cmp(&b.quote.price_per_hour));

            // Only the extremal pair is evaluated; intermediate offers are
            // kept as context but generate no separate opportunities.
            let cheapest = group.first().cloned().expect("non-empty group");
            let most_expensive = group.last().cloned().expect("non-empty group");

            let price_difference =
                most_expensive.quote.price_per_hour - cheapest.quote.price_per_hour;
            let percentage_savings = percentage_of(price_difference, most_expensive.quote.price_per_hour);

            if price_difference >= self.config.min_price_difference
                && percentage_savings >= self.config.min_percentage_savings
            {
                debug!(
                    gpu_model = %gpu_model,
                    cheapest = %cheapest.quote.provider,
                    most_expensive = %most_expensive.quote.provider,
                    pct = percentage_savings,
                    "Opportunity found"
                );
                opportunities.push(Opportunity {
                    gpu_model,
                    cheapest,
                    most_expensive,
                    price_difference,
                    percentage_savings,
                    all_quotes: group,
                });
            }
        }

        // Stable: equal savings keep their (deterministic) insertion order.
        opportunities.sort_by(|a, b| {
            b.percentage_savings
                .partial_cmp(&a.percentage_savings)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        opportunities
    }

    /// The single best opportunity, if any.
    pub fn best(&self, quotes: &[Quote]) -> Option<Opportunity> {
        self.detect(quotes).into_iter().next()
    }

    /// The opportunity for one named GPU model, if any qualifies.
    pub fn for_gpu(&self, quotes: &[Quote], gpu_model: &str) -> Option<Opportunity> {
        self.detect(quotes)
            .into_iter()
            .find(|o| o.gpu_model.eq_ignore_ascii_case(gpu_model))
    }

    /// Compare every provider offering one GPU model, regardless of
    /// whether the spread qualifies as an opportunity.
    pub fn compare_providers(&self, quotes: &[Quote], gpu_model: &str) -> Option<ProviderComparison> {
        let ranked = self.normalizer.rank_by_score(quotes, Some(gpu_model));
        if ranked.is_empty() {
            return None;
        }

        let best = ranked.first().cloned()?;
        let worst = ranked.last().cloned()?;
        let price_difference = worst.quote.price_per_hour - best.quote.price_per_hour;
        let price_difference_percent =
            percentage_of(price_difference, worst.quote.price_per_hour);

        Some(ProviderComparison {
            gpu_model: best.quote.gpu_model.clone(),
            tflops: best.tflops,
            providers_compared: ranked.len(),
            best,
            worst,
            price_difference,
            price_difference_percent,
            all_options: ranked,
        })
    }
}

/// Cheapest/most-expensive region spread within one provider's own
/// offerings of one GPU. Surfaces intra-source regional arbitrage.
pub fn cross_region_spread(
    quotes: &[Quote],
    provider: &str,
    gpu_model: &str,
) -> Option<RegionalSpread> {
    let mut filtered: Vec<&Quote> = quotes
        .iter()
        .filter(|q| {
            q.provider.eq_ignore_ascii_case(provider)
                && q.gpu_model.eq_ignore_ascii_case(gpu_model)
        })
        .collect();

    if filtered.len() < 2 {
        return None;
    }

    filtered.sort_by(|a, b| a.price_per_hour.cmp(&b.price_per_hour));
    let cheapest = filtered.first()?;
    let most_expensive = filtered.last()?;
    let price_difference = most_expensive.price_per_hour - cheapest.price_per_hour;
    if price_difference <= Decimal::ZERO {
        return None;
    }

    Some(RegionalSpread {
        provider: cheapest.provider.clone(),
        gpu_model: cheapest.gpu_model.clone(),
        cheapest_region: cheapest.region.clone(),
        cheapest_price: cheapest.price_per_hour,
        most_expensive_region: most_expensive.region.clone(),
        most_expensive_price: most_expensive.price_per_hour,
        price_difference,
        percentage_savings: percentage_of(price_difference, most_expensive.price_per_hour),
    })
}

/// `difference / reference * 100`, with a zero reference yielding 0.
fn percentage_of(difference: Decimal, reference: Decimal) -> f64 {
    if reference.is_zero() {
        0.0
    } else {
        (difference / reference * dec!(100)).to_f64().unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
