//! Batch analytics over collected quotes.
//!
//! Simple descriptive statistics: price trends per model/provider and a
//! provider reliability ranking from availability figures. No
//! forecasting — outlier and spread measures only.

use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Quote;

/// Descriptive price statistics for an optionally filtered quote set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendReport {
    pub gpu_model: Option<String>,
    pub provider: Option<String>,
    pub sample_count: usize,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub std_dev: f64,
    /// Coefficient of variation in percent; a spread/outlier signal.
    pub volatility_pct: f64,
}

/// Price trend statistics, optionally filtered by GPU model and provider.
/// Returns `None` when no quotes survive the filters.
pub fn price_trends(
    quotes: &[Quote],
    gpu_model: Option<&str>,
    provider: Option<&str>,
) -> Option<TrendReport> {
    let prices: Vec<f64> = quotes
        .iter()
        .filter(|q| match gpu_model {
            Some(m) => q.gpu_model.eq_ignore_ascii_case(m),
            None => true,
        })
        .filter(|q| match provider {
            Some(p) => q.provider.eq_ignore_ascii_case(p),
            None => true,
        })
        .map(|q| q.price_per_hour.to_f64().unwrap_or(0.0))
        .collect();

    if prices.is_empty() {
        return None;
    }

    let n = prices.len();
    let avg = prices.iter().sum::<f64>() / n as f64;
    let min = prices.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let std_dev = sample_std_dev(&prices, avg);
    let volatility_pct = if avg > 0.0 { std_dev / avg * 100.0 } else { 0.0 };

    Some(TrendReport {
        gpu_model: gpu_model.map(str::to_string),
        provider: provider.map(str::to_string),
        sample_count: n,
        avg_price: avg,
        min_price: min,
        max_price: max,
        std_dev,
        volatility_pct,
    })
}

/// Availability-derived reliability metrics for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityScore {
    pub provider: String,
    pub avg_availability: f64,
    pub min_availability: f64,
    pub max_availability: f64,
    /// 1 minus the availability standard deviation; 1.0 for a single sample.
    pub consistency: f64,
    pub sample_count: usize,
}

/// Rank providers by average availability, most reliable first.
pub fn provider_reliability(quotes: &[Quote]) -> Vec<ReliabilityScore> {
    let mut by_provider: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for q in quotes {
        by_provider
            .entry(q.provider.as_str())
            .or_default()
            .push(q.availability);
    }

    let mut scores: Vec<ReliabilityScore> = by_provider
        .into_iter()
        .map(|(provider, avail)| {
            let n = avail.len();
            let avg = avail.iter().sum::<f64>() / n as f64;
            let min = avail.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = avail.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let consistency = if n > 1 {
                1.0 - sample_std_dev(&avail, avg)
            } else {
                1.0
            };
            ReliabilityScore {
                provider: provider.to_string(),
                avg_availability: avg,
                min_availability: min,
                max_availability: max,
                consistency,
                sample_count: n,
            }
        })
        .collect();

    scores.sort_by(|a, b| {
        b.avg_availability
            .partial_cmp(&a.avg_availability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scores
}

/// Sample standard deviation (n - 1 denominator); 0 for fewer than two
/// samples.
fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let var = values
        .iter()
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    var.sqrt()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
