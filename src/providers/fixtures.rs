//! Fixture-backed providers.
//!
//! Each provider holds a static catalogue of listings and stamps them
//! with a fresh observation timestamp on every fetch, simulating a live
//! pricing API without network access. Figures are representative
//! on-demand rates per provider and region.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use super::QuoteProvider;
use crate::types::Quote;

/// One catalogue row: everything a quote needs except the timestamp.
#[derive(Debug, Clone)]
pub struct Listing {
    pub region: &'static str,
    pub gpu_model: &'static str,
    pub price_per_hour: Decimal,
    pub availability: f64,
    pub instance_type: Option<&'static str>,
    pub gpu_count: u32,
    pub memory_gb: u32,
}

/// A provider that serves a fixed catalogue of listings.
pub struct FixtureProvider {
    name: String,
    listings: Vec<Listing>,
}

impl FixtureProvider {
    pub fn new(name: impl Into<String>, listings: Vec<Listing>) -> Self {
        Self {
            name: name.into(),
            listings,
        }
    }
}

#[async_trait]
impl QuoteProvider for FixtureProvider {
    async fn fetch_quotes(&self) -> Result<Vec<Quote>> {
        let now = Utc::now();
        Ok(self
            .listings
            .iter()
            .map(|l| Quote {
                provider: self.name.clone(),
                region: l.region.to_string(),
                gpu_model: l.gpu_model.to_string(),
                price_per_hour: l.price_per_hour,
                availability: l.availability,
                instance_type: l.instance_type.map(str::to_string),
                gpu_count: Some(l.gpu_count),
                memory_gb: Some(l.memory_gb),
                timestamp: now,
            })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn listing(
    region: &'static str,
    gpu_model: &'static str,
    price: Decimal,
    availability: f64,
    instance_type: Option<&'static str>,
    gpu_count: u32,
    memory_gb: u32,
) -> Listing {
    Listing {
        region,
        gpu_model,
        price_per_hour: price,
        availability,
        instance_type,
        gpu_count,
        memory_gb,
    }
}

/// The default set of registered providers: the six sources tracked by
/// the engine, each with its own regional catalogue.
pub fn default_fleet() -> Vec<Arc<dyn QuoteProvider>> {
    vec![
        Arc::new(FixtureProvider::new(
            "AWS",
            vec![
                listing("us-east-1", "A100", dec!(4.10), 0.72, Some("p4d.24xlarge"), 8, 80),
                listing("us-west-2", "A100", dec!(4.35), 0.65, Some("p4d.24xlarge"), 8, 80),
                listing("us-east-1", "V100", dec!(3.06), 0.88, Some("p3.2xlarge"), 1, 16),
                listing("eu-west-1", "T4", dec!(0.53), 0.95, Some("g4dn.xlarge"), 1, 16),
            ],
        )),
        Arc::new(FixtureProvider::new(
            "GCP",
            vec![
                listing("us-central1", "A100", dec!(3.67), 0.78, Some("a2-highgpu-1g"), 1, 40),
                listing("europe-west4", "A100", dec!(3.93), 0.70, Some("a2-highgpu-1g"), 1, 40),
                listing("us-central1", "V100", dec!(2.48), 0.90, Some("n1-standard-8"), 1, 16),
                listing("us-central1", "T4", dec!(0.35), 0.97, Some("n1-standard-4"), 1, 16),
            ],
        )),
        Arc::new(FixtureProvider::new(
            "Azure",
            vec![
                listing("eastus", "A100", dec!(3.40), 0.68, Some("NC24ads_A100_v4"), 1, 80),
                listing("westeurope", "A100", dec!(3.72), 0.61, Some("NC24ads_A100_v4"), 1, 80),
                listing("eastus", "V100", dec!(3.06), 0.82, Some("NC6s_v3"), 1, 16),
            ],
        )),
        Arc::new(FixtureProvider::new(
            "RunPod",
            vec![
                listing("us-east", "A100", dec!(1.89), 0.55, Some("secure-cloud"), 1, 80),
                listing("eu-central", "RTX 4090", dec!(0.69), 0.80, Some("community-cloud"), 1, 24),
                listing("us-east", "RTX 3090", dec!(0.44), 0.85, Some("community-cloud"), 1, 24),
                listing("us-east", "H100", dec!(3.89), 0.45, Some("secure-cloud"), 1, 80),
            ],
        )),
        Arc::new(FixtureProvider::new(
            "Vast.ai",
            vec![
                listing("global", "RTX 4090", dec!(0.52), 0.75, None, 1, 24),
                listing("global", "RTX 3090", dec!(0.31), 0.83, None, 1, 24),
                listing("global", "A100", dec!(1.65), 0.40, None, 1, 80),
                listing("global", "H100", dec!(2.85), 0.35, None, 1, 80),
            ],
        )),
        Arc::new(FixtureProvider::new(
            "Lambda Labs",
            vec![
                listing("us-east-1", "A100", dec!(1.29), 0.30, Some("gpu_1x_a100"), 1, 40),
                listing("us-west-1", "H100", dec!(2.49), 0.25, Some("gpu_1x_h100_pcie"), 1, 80),
                listing("us-east-1", "A10", dec!(0.75), 0.60, Some("gpu_1x_a10"), 1, 24),
            ],
        )),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
