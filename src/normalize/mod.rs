//! Price normalization and cost-performance scoring.
//!
//! Maps each quote's GPU model to a performance profile and derives two
//! comparable metrics: cost per TFLOP (lower is better) and a composite
//! cost-performance score (higher is better), optionally weighted by
//! availability. Unknown hardware is tolerated — the quote is kept with
//! the normalization flag unset.

pub mod specs;

use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;

use crate::types::{NormalizedQuote, Precision, Quote};

/// TFLOPS boundaries for the performance tiers.
const HIGH_END_TFLOPS: f64 = 50.0;
const MID_RANGE_TFLOPS: f64 = 15.0;

/// Stateless normalization engine. Applies per-quote with no cross-quote
/// state; batch operations preserve input order.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    pub precision: Precision,
    /// Weight the score by the quoted availability fraction.
    pub include_availability: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            precision: Precision::Fp32,
            include_availability: true,
        }
    }
}

impl Normalizer {
    pub fn new(precision: Precision, include_availability: bool) -> Self {
        Self {
            precision,
            include_availability,
        }
    }

    /// Normalize a single quote.
    ///
    /// Unknown model or a zero/absent performance figure yields an
    /// un-normalized record; the quote itself is never discarded.
    /// A zero price yields a score of 0, not an error.
    pub fn normalize(&self, quote: &Quote) -> NormalizedQuote {
        let Some(spec) = specs::lookup(&quote.gpu_model) else {
            return NormalizedQuote::unnormalized(quote.clone(), self.precision);
        };

        let tflops = spec.tflops(self.precision);
        if tflops <= 0.0 {
            return NormalizedQuote::unnormalized(quote.clone(), self.precision);
        }

        let price = quote.price_per_hour.to_f64().unwrap_or(0.0);
        let cost_per_tflop = price / tflops;
        let score = if price > 0.0 {
            let base = tflops / price;
            if self.include_availability {
                base * quote.availability
            } else {
                base
            }
        } else {
            0.0
        };

        NormalizedQuote {
            quote: quote.clone(),
            normalized: true,
            precision: self.precision,
            tflops: Some(tflops),
            cost_per_tflop: Some(cost_per_tflop),
            score: Some(score),
        }
    }

    /// Normalize a batch. Order is preserved; every input produces an
    /// output record.
    pub fn normalize_batch(&self, quotes: &[Quote]) -> Vec<NormalizedQuote> {
        quotes.iter().map(|q| self.normalize(q)).collect()
    }

    /// Rank quotes by cost-performance score, best value first.
    ///
    /// Records that could not be normalized are excluded. An optional
    /// model filter restricts the ranking to one GPU.
    pub fn rank_by_score(
        &self,
        quotes: &[Quote],
        gpu_model: Option<&str>,
    ) -> Vec<NormalizedQuote> {
        let mut ranked: Vec<NormalizedQuote> = self
            .normalize_batch(quotes)
            .into_iter()
            .filter(|nq| nq.normalized)
            .filter(|nq| match gpu_model {
                Some(m) => nq.quote.gpu_model.eq_ignore_ascii_case(m),
                None => true,
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    /// The single best-value offer, subject to a minimum availability.
    pub fn find_best_value(
        &self,
        quotes: &[Quote],
        gpu_model: Option<&str>,
        min_availability: f64,
    ) -> Option<NormalizedQuote> {
        self.rank_by_score(quotes, gpu_model)
            .into_iter()
            .find(|nq| nq.quote.availability >= min_availability)
    }

    /// Group quotes into performance tiers by their TFLOPS figure.
    pub fn performance_tiers(&self, quotes: &[Quote]) -> TieredQuotes {
        let mut tiers = TieredQuotes::default();
        for nq in self.normalize_batch(quotes) {
            match nq.tflops {
                Some(t) if t >= HIGH_END_TFLOPS => tiers.high_end.push(nq),
                Some(t) if t >= MID_RANGE_TFLOPS => tiers.mid_range.push(nq),
                Some(_) => tiers.entry.push(nq),
                None => tiers.unknown.push(nq),
            }
        }
        tiers
    }
}

/// Quotes bucketed by performance tier.
#[derive(Debug, Default)]
pub struct TieredQuotes {
    /// >= 50 TFLOPS (H100, RTX 4090, ...)
    pub high_end: Vec<NormalizedQuote>,
    /// 15–50 TFLOPS (A100, V100, RTX 3090, ...)
    pub mid_range: Vec<NormalizedQuote>,
    /// < 15 TFLOPS (T4, ...)
    pub entry: Vec<NormalizedQuote>,
    pub unknown: Vec<NormalizedQuote>,
}

/// Mean price per GPU model over a batch, keyed deterministically.
/// Used by the analytics surface for quick summaries.
pub fn mean_price_by_model(quotes: &[Quote]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for q in quotes {
        let entry = sums.entry(q.gpu_model.clone()).or_insert((0.0, 0));
        entry.0 += q.price_per_hour.to_f64().unwrap_or(0.0);
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(model, (sum, n))| (model, sum / n as f64))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
