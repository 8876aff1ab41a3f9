//! Fan-out collection scheduler.
//!
//! Queries all registered providers — concurrently by default — with
//! per-provider retry and exponential backoff, and merges the surviving
//! quotes into one `CollectionCycleResult`. One provider exhausting its
//! retry budget never aborts the cycle; it is recorded as a failed
//! outcome contributing zero quotes.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::providers::QuoteProvider;
use crate::types::{CollectionCycleResult, ProviderOutcome, Quote};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Whether a cycle fans out to all providers in parallel or walks them
/// one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Concurrent,
    Sequential,
}

/// Per-provider retry budget. Backoff between attempts is
/// `backoff_base * 2^attempt` (attempt indexed from zero).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fans out to every registered provider and aggregates partial results.
///
/// Providers are registered once at construction; the scheduler holds no
/// other state, so a single instance can serve concurrent callers.
pub struct CollectionScheduler {
    providers: Vec<Arc<dyn QuoteProvider>>,
    retry: RetryPolicy,
}

impl CollectionScheduler {
    pub fn new(providers: Vec<Arc<dyn QuoteProvider>>, retry: RetryPolicy) -> Self {
        Self { providers, retry }
    }

    /// Number of registered providers.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Run one collection cycle.
    ///
    /// Fails only on invalid input (an empty provider registry); every
    /// provider-level failure is converted into a recorded outcome.
    pub async fn collect(&self, mode: ExecutionMode) -> Result<CollectionCycleResult> {
        if self.providers.is_empty() {
            anyhow::bail!("no providers registered");
        }

        let started_at = Utc::now();
        let t0 = Instant::now();
        let mut outcomes = Vec::with_capacity(self.providers.len());
        let mut quotes: Vec<Quote> = Vec::new();

        match mode {
            ExecutionMode::Concurrent => {
                // One task per provider; results drained in completion order.
                let mut set = JoinSet::new();
                for provider in &self.providers {
                    let provider = Arc::clone(provider);
                    let retry = self.retry;
                    set.spawn(async move { fetch_with_retry(provider, retry).await });
                }

                while let Some(joined) = set.join_next().await {
                    match joined {
                        Ok((outcome, batch)) => {
                            quotes.extend(batch);
                            outcomes.push(outcome);
                        }
                        Err(e) => {
                            // A panicked worker loses its provider
                            // attribution; the cycle itself continues.
                            error!(error = %e, "Provider worker task failed");
                        }
                    }
                }
            }
            ExecutionMode::Sequential => {
                for provider in &self.providers {
                    let (outcome, batch) =
                        fetch_with_retry(Arc::clone(provider), self.retry).await;
                    quotes.extend(batch);
                    outcomes.push(outcome);
                }
            }
        }

        let providers_successful = outcomes.iter().filter(|o| o.success).count();
        let result = CollectionCycleResult {
            started_at,
            completed_at: Utc::now(),
            elapsed: t0.elapsed(),
            providers_queried: self.providers.len(),
            providers_successful,
            total_prices: quotes.len(),
            outcomes,
            quotes,
        };

        info!(
            providers_successful = result.providers_successful,
            providers_queried = result.providers_queried,
            total_prices = result.total_prices,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "Collection cycle complete"
        );

        Ok(result)
    }
}

/// Fetch one provider with retry. Returns the outcome and the provider's
/// validated quotes (empty on failure). Never returns an error.
async fn fetch_with_retry(
    provider: Arc<dyn QuoteProvider>,
    retry: RetryPolicy,
) -> (ProviderOutcome, Vec<Quote>) {
    let name = provider.name().to_string();
    let max_attempts = retry.max_attempts.max(1);

    for attempt in 0..max_attempts {
        match provider.fetch_quotes().await {
            Ok(raw) => {
                let quotes = drop_malformed(&name, raw);
                debug!(
                    provider = %name,
                    quotes = quotes.len(),
                    attempts = attempt + 1,
                    "Provider fetch succeeded"
                );
                return (
                    ProviderOutcome {
                        provider: name,
                        success: true,
                        quote_count: quotes.len(),
                        attempts: attempt + 1,
                        error: None,
                    },
                    quotes,
                );
            }
            Err(e) if attempt + 1 < max_attempts => {
                let backoff = retry.backoff_base * 2u32.pow(attempt);
                warn!(
                    provider = %name,
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Provider fetch failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                error!(
                    provider = %name,
                    attempts = max_attempts,
                    error = %e,
                    "Provider fetch failed, retry budget exhausted"
                );
                return (
                    ProviderOutcome {
                        provider: name,
                        success: false,
                        quote_count: 0,
                        attempts: max_attempts,
                        error: Some(e.to_string()),
                    },
                    Vec::new(),
                );
            }
        }
    }

    unreachable!("retry loop always returns")
}

/// Drop malformed quotes from a provider batch, keeping the rest in order.
fn drop_malformed(provider: &str, raw: Vec<Quote>) -> Vec<Quote> {
    raw.into_iter()
        .filter(|q| match q.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(provider, quote = %q, reason = %e, "Dropping malformed quote");
                false
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockQuoteProvider;
    use anyhow::anyhow;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quote(provider: &str, model: &str, price: rust_decimal::Decimal) -> Quote {
        Quote {
            provider: provider.to_string(),
            region: "us-east-1".to_string(),
            gpu_model: model.to_string(),
            price_per_hour: price,
            availability: 0.9,
            instance_type: None,
            gpu_count: Some(1),
            memory_gb: Some(80),
            timestamp: Utc::now(),
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_base: Duration::from_millis(2),
        }
    }

    fn ok_provider(name: &'static str, quotes: Vec<Quote>) -> Arc<dyn QuoteProvider> {
        let mut mock = MockQuoteProvider::new();
        mock.expect_name().return_const(name.to_string());
        mock.expect_fetch_quotes()
            .returning(move || Ok(quotes.clone()));
        Arc::new(mock)
    }

    fn failing_provider(name: &'static str) -> Arc<dyn QuoteProvider> {
        let mut mock = MockQuoteProvider::new();
        mock.expect_name().return_const(name.to_string());
        mock.expect_fetch_quotes()
            .returning(|| Err(anyhow!("connection refused")));
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_empty_registry_is_an_error() {
        let scheduler = CollectionScheduler::new(Vec::new(), RetryPolicy::default());
        let err = scheduler.collect(ExecutionMode::Concurrent).await.unwrap_err();
        assert!(err.to_string().contains("no providers"));
    }

    #[tokio::test]
    async fn test_concurrent_cycle_merges_all_providers() {
        let scheduler = CollectionScheduler::new(
            vec![
                ok_provider("AWS", vec![quote("AWS", "A100", dec!(4.10))]),
                ok_provider(
                    "GCP",
                    vec![
                        quote("GCP", "A100", dec!(3.67)),
                        quote("GCP", "T4", dec!(0.35)),
                    ],
                ),
            ],
            fast_retry(3),
        );

        let result = scheduler.collect(ExecutionMode::Concurrent).await.unwrap();
        assert_eq!(result.providers_queried, 2);
        assert_eq!(result.providers_successful, 2);
        assert_eq!(result.total_prices, 3);
        assert_eq!(result.quotes.len(), 3);
        assert!(result.outcomes.iter().all(|o| o.success && o.attempts == 1));
    }

    #[tokio::test]
    async fn test_one_failure_never_aborts_the_cycle() {
        let scheduler = CollectionScheduler::new(
            vec![
                ok_provider("AWS", vec![quote("AWS", "A100", dec!(4.10))]),
                failing_provider("Azure"),
            ],
            fast_retry(2),
        );

        let result = scheduler.collect(ExecutionMode::Concurrent).await.unwrap();
        assert_eq!(result.providers_queried, 2);
        assert_eq!(result.providers_successful, 1);
        assert_eq!(result.total_prices, 1);

        let failed = result.outcomes.iter().find(|o| !o.success).unwrap();
        assert_eq!(failed.provider, "Azure");
        assert_eq!(failed.attempts, 2);
        assert_eq!(failed.quote_count, 0);
        assert!(failed.error.as_deref().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_all_providers_fail_yields_empty_result() {
        let scheduler = CollectionScheduler::new(
            vec![failing_provider("AWS"), failing_provider("GCP")],
            fast_retry(2),
        );

        let result = scheduler.collect(ExecutionMode::Concurrent).await.unwrap();
        assert_eq!(result.providers_successful, 0);
        assert_eq!(result.total_prices, 0);
        assert!(result.quotes.is_empty());
    }

    #[tokio::test]
    async fn test_flaky_provider_recovers_within_budget() {
        static CALLS: AtomicU32 = AtomicU32::new(0);

        let mut mock = MockQuoteProvider::new();
        mock.expect_name().return_const("RunPod".to_string());
        mock.expect_fetch_quotes().returning(|| {
            // Fail the first two attempts, then serve.
            if CALLS.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(anyhow!("rate limited"))
            } else {
                Ok(vec![Quote {
                    provider: "RunPod".to_string(),
                    region: "us-east".to_string(),
                    gpu_model: "A100".to_string(),
                    price_per_hour: dec!(1.89),
                    availability: 0.55,
                    instance_type: None,
                    gpu_count: Some(1),
                    memory_gb: Some(80),
                    timestamp: Utc::now(),
                }])
            }
        });

        let scheduler = CollectionScheduler::new(vec![Arc::new(mock)], fast_retry(3));
        let result = scheduler.collect(ExecutionMode::Sequential).await.unwrap();

        assert_eq!(result.providers_successful, 1);
        assert_eq!(result.outcomes[0].attempts, 3);
        assert_eq!(result.total_prices, 1);
    }

    #[tokio::test]
    async fn test_malformed_quotes_are_dropped_not_fatal() {
        let mut bad = quote("AWS", "A100", dec!(4.10));
        bad.availability = 1.7;
        let scheduler = CollectionScheduler::new(
            vec![ok_provider(
                "AWS",
                vec![quote("AWS", "V100", dec!(3.06)), bad],
            )],
            fast_retry(1),
        );

        let result = scheduler.collect(ExecutionMode::Sequential).await.unwrap();
        assert_eq!(result.providers_successful, 1);
        assert_eq!(result.total_prices, 1);
        assert_eq!(result.quotes[0].gpu_model, "V100");
        assert_eq!(result.outcomes[0].quote_count, 1);
    }

    #[tokio::test]
    async fn test_sequential_preserves_registration_order() {
        let scheduler = CollectionScheduler::new(
            vec![
                ok_provider("AWS", vec![quote("AWS", "A100", dec!(4.10))]),
                ok_provider("GCP", vec![quote("GCP", "A100", dec!(3.67))]),
            ],
            fast_retry(1),
        );

        let result = scheduler.collect(ExecutionMode::Sequential).await.unwrap();
        let names: Vec<&str> = result.outcomes.iter().map(|o| o.provider.as_str()).collect();
        assert_eq!(names, vec!["AWS", "GCP"]);
    }

    #[tokio::test]
    async fn test_backoff_is_exponential() {
        let policy = fast_retry(3);
        let t0 = Instant::now();
        let (_outcome, quotes) = fetch_with_retry(failing_provider("AWS"), policy).await;
        let elapsed = t0.elapsed();
        assert!(quotes.is_empty());
        // Two sleeps: base * 1 + base * 2 = 6ms minimum.
        assert!(elapsed >= Duration::from_millis(6), "elapsed {elapsed:?}");
    }
}
