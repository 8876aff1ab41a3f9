//! Shared types for the arbitrage engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that provider, normalization,
//! and detection modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Quote
// ---------------------------------------------------------------------------

/// A single price observation from one provider for one GPU model
/// in one region at one point in time. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    /// Provider identifier: "AWS" | "GCP" | "Azure" | "RunPod" | ...
    pub provider: String,
    pub region: String,
    /// Hardware model name, e.g. "A100" or "RTX 4090".
    pub gpu_model: String,
    /// Hourly rental price in USD.
    pub price_per_hour: Decimal,
    /// Fraction of capacity currently available (0.0–1.0).
    pub availability: f64,
    #[serde(default)]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub gpu_count: Option<u32>,
    #[serde(default)]
    pub memory_gb: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} @ {} — ${}/hr ({:.0}% available)",
            self.provider,
            self.gpu_model,
            self.region,
            self.price_per_hour,
            self.availability * 100.0,
        )
    }
}

impl Quote {
    /// Validate the quote's invariants: non-empty identifiers, a
    /// non-negative price, and availability within [0, 1].
    pub fn validate(&self) -> Result<(), QuoteError> {
        if self.provider.trim().is_empty() {
            return Err(QuoteError::MissingField("provider"));
        }
        if self.region.trim().is_empty() {
            return Err(QuoteError::MissingField("region"));
        }
        if self.gpu_model.trim().is_empty() {
            return Err(QuoteError::MissingField("gpu_model"));
        }
        if self.price_per_hour.is_sign_negative() {
            return Err(QuoteError::NegativePrice(self.price_per_hour));
        }
        if !(0.0..=1.0).contains(&self.availability) {
            return Err(QuoteError::AvailabilityOutOfRange(self.availability));
        }
        Ok(())
    }
}

/// Validation failure for a single quote. Malformed quotes are dropped
/// from a batch with a logged reason, never propagated as a batch failure.
#[derive(Debug, Error, PartialEq)]
pub enum QuoteError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("price must be non-negative, got {0}")]
    NegativePrice(Decimal),
    #[error("availability must be within [0, 1], got {0}")]
    AvailabilityOutOfRange(f64),
}

// ---------------------------------------------------------------------------
// Precision
// ---------------------------------------------------------------------------

/// Numeric-precision mode used to pick a performance figure from the
/// GPU spec table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Fp32,
    Fp16,
    Tensor,
}

impl Default for Precision {
    fn default() -> Self {
        Precision::Fp32
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Fp32 => write!(f, "fp32"),
            Precision::Fp16 => write!(f, "fp16"),
            Precision::Tensor => write!(f, "tensor"),
        }
    }
}

impl std::str::FromStr for Precision {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fp32" => Ok(Precision::Fp32),
            "fp16" => Ok(Precision::Fp16),
            "tensor" => Ok(Precision::Tensor),
            _ => Err(anyhow::anyhow!("Unknown precision mode: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// NormalizedQuote
// ---------------------------------------------------------------------------

/// A quote augmented with performance-normalized cost metrics.
///
/// When the GPU model is unknown, or the selected precision has no
/// performance figure, `normalized` is false and every derived field is
/// `None`. Such records are excluded from performance rankings but stay
/// in raw listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedQuote {
    #[serde(flatten)]
    pub quote: Quote,
    pub normalized: bool,
    pub precision: Precision,
    /// Performance figure used for normalization, in TFLOPS.
    pub tflops: Option<f64>,
    /// Price divided by performance — lower is better.
    pub cost_per_tflop: Option<f64>,
    /// Performance divided by price, optionally weighted by availability —
    /// higher is better. Zero when the price is zero.
    pub score: Option<f64>,
}

impl NormalizedQuote {
    /// A quote that could not be normalized. The raw quote is preserved.
    pub fn unnormalized(quote: Quote, precision: Precision) -> Self {
        Self {
            quote,
            normalized: false,
            precision,
            tflops: None,
            cost_per_tflop: None,
            score: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Collection cycle
// ---------------------------------------------------------------------------

/// Per-provider outcome of one collection cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub provider: String,
    pub success: bool,
    pub quote_count: usize,
    /// Fetch attempts consumed, including the successful one.
    pub attempts: u32,
    /// Last error when the retry budget was exhausted.
    pub error: Option<String>,
}

/// Result of one fan-out round across all registered providers.
///
/// Created at the start of a scheduler invocation, fully populated by its
/// end, then handed to downstream consumers as an immutable value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionCycleResult {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Wall-clock duration of the whole cycle.
    pub elapsed: Duration,
    pub providers_queried: usize,
    pub providers_successful: usize,
    pub total_prices: usize,
    pub outcomes: Vec<ProviderOutcome>,
    /// Union of all successful providers' quotes. Intra-provider order is
    /// preserved; cross-provider order follows completion order.
    pub quotes: Vec<Quote>,
}

impl fmt::Display for CollectionCycleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycle: {}/{} providers, {} prices in {:.2}s",
            self.providers_successful,
            self.providers_queried,
            self.total_prices,
            self.elapsed.as_secs_f64(),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
