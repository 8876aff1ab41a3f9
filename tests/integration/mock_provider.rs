//! Mock quote provider for integration testing.
//!
//! A deterministic `QuoteProvider` implementation with fully
//! controllable quotes, transient failures, and forced errors — all
//! in-memory with no external dependencies.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use gpuarb::providers::QuoteProvider;
use gpuarb::types::Quote;

/// A mock GPU provider for deterministic testing.
pub struct MockProvider {
    name: String,
    quotes: Vec<Quote>,
    /// Number of calls that fail before fetches start succeeding.
    failures_remaining: AtomicU32,
    /// If set, all fetches return this error regardless of the
    /// failure counter.
    force_error: Mutex<Option<String>>,
    calls: AtomicU32,
}

impl MockProvider {
    pub fn new(name: &str, quotes: Vec<Quote>) -> Self {
        Self {
            name: name.to_string(),
            quotes,
            failures_remaining: AtomicU32::new(0),
            force_error: Mutex::new(None),
            calls: AtomicU32::new(0),
        }
    }

    /// Fail the first `n` fetches, then serve normally.
    pub fn with_transient_failures(name: &str, quotes: Vec<Quote>, n: u32) -> Self {
        let p = Self::new(name, quotes);
        p.failures_remaining.store(n, Ordering::SeqCst);
        p
    }

    /// Force every subsequent fetch to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Number of fetch calls observed so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteProvider for MockProvider {
    async fn fetch_quotes(&self) -> Result<Vec<Quote>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(anyhow!(msg));
        }

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("{}: transient failure", self.name));
        }

        Ok(self.quotes.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build a quote with sensible defaults for tests.
pub fn quote(provider: &str, region: &str, model: &str, price: Decimal, availability: f64) -> Quote {
    Quote {
        provider: provider.to_string(),
        region: region.to_string(),
        gpu_model: model.to_string(),
        price_per_hour: price,
        availability,
        instance_type: None,
        gpu_count: Some(1),
        memory_gb: None,
        timestamp: Utc::now(),
    }
}
