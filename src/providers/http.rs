//! Generic HTTP quote provider.
//!
//! Fetches GPU price listings from any endpoint that returns a JSON array
//! in the standardized quote schema. Authentication, when needed, is a
//! bearer token kept behind `secrecy` so it never appears in debug output.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use super::QuoteProvider;
use crate::types::Quote;

/// Wire shape of one listing. `timestamp` is optional — listings without
/// one are stamped at receipt time.
#[derive(Debug, Deserialize)]
struct WireQuote {
    provider: Option<String>,
    region: String,
    gpu_model: String,
    price_per_hour: Decimal,
    availability: f64,
    #[serde(default)]
    instance_type: Option<String>,
    #[serde(default)]
    gpu_count: Option<u32>,
    #[serde(default)]
    memory_gb: Option<u32>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// A provider backed by a live HTTP pricing endpoint.
pub struct HttpProvider {
    name: String,
    endpoint: String,
    api_key: Option<SecretString>,
    http: Client,
}

impl HttpProvider {
    /// Create a new HTTP provider.
    ///
    /// `api_key` is optional — public pricing endpoints need none.
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
    ) -> Result<Self> {
        let name = name.into();
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("gpuarb/0.1.0 (gpu-price-aggregator)")
            .build()
            .with_context(|| format!("Failed to build HTTP client for {name}"))?;

        Ok(Self {
            name,
            endpoint: endpoint.into(),
            api_key,
            http,
        })
    }

    /// The query URL, restricted to this provider's own listings.
    fn listings_url(&self) -> String {
        format!(
            "{}?provider={}",
            self.endpoint,
            urlencoding::encode(&self.name)
        )
    }
}

#[async_trait]
impl QuoteProvider for HttpProvider {
    async fn fetch_quotes(&self) -> Result<Vec<Quote>> {
        let url = self.listings_url();
        debug!(provider = %self.name, url = %url, "Fetching listings");

        let mut req = self.http.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("{} pricing request failed", self.name))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} pricing API error {status}: {body}", self.name);
        }

        let wire: Vec<WireQuote> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse {} listings response", self.name))?;

        let now = Utc::now();
        let quotes = wire
            .into_iter()
            .map(|w| Quote {
                provider: w.provider.unwrap_or_else(|| self.name.clone()),
                region: w.region,
                gpu_model: w.gpu_model,
                price_per_hour: w.price_per_hour,
                availability: w.availability,
                instance_type: w.instance_type,
                gpu_count: w.gpu_count,
                memory_gb: w.memory_gb,
                timestamp: w.timestamp.unwrap_or(now),
            })
            .collect::<Vec<_>>();

        if quotes.is_empty() {
            warn!(provider = %self.name, "Endpoint returned no listings");
        }

        Ok(quotes)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listings_url_encodes_name() {
        let p = HttpProvider::new("Vast.ai", "https://pricing.example.com/v1/listings", None)
            .unwrap();
        assert_eq!(
            p.listings_url(),
            "https://pricing.example.com/v1/listings?provider=Vast.ai"
        );

        let p = HttpProvider::new("Lambda Labs", "https://pricing.example.com/v1/listings", None)
            .unwrap();
        assert!(p.listings_url().ends_with("provider=Lambda%20Labs"));
    }

    #[test]
    fn test_wire_quote_parses_minimal_payload() {
        let json = r#"{
            "region": "us-east-1",
            "gpu_model": "A100",
            "price_per_hour": 3.67,
            "availability": 0.78
        }"#;
        let w: WireQuote = serde_json::from_str(json).unwrap();
        assert_eq!(w.gpu_model, "A100");
        assert!(w.provider.is_none());
        assert!(w.timestamp.is_none());
        assert!(w.instance_type.is_none());
    }

    #[test]
    fn test_wire_quote_parses_full_payload() {
        let json = r#"{
            "provider": "GCP",
            "region": "us-central1",
            "gpu_model": "T4",
            "price_per_hour": 0.35,
            "availability": 0.97,
            "instance_type": "n1-standard-4",
            "gpu_count": 1,
            "memory_gb": 16,
            "timestamp": "2026-08-01T12:00:00Z"
        }"#;
        let w: WireQuote = serde_json::from_str(json).unwrap();
        assert_eq!(w.provider.as_deref(), Some("GCP"));
        assert_eq!(w.gpu_count, Some(1));
        assert!(w.timestamp.is_some());
    }
}
