//! Provider integrations.
//!
//! Defines the `QuoteProvider` trait and provides implementations for:
//! - Fixture-backed providers (deterministic catalogues for the six
//!   registered sources)
//! - A generic HTTP adapter for any endpoint returning the standardized
//!   quote schema
//!
//! Whether a provider is backed by fixtures or a live API is invisible
//! to the collection scheduler.

pub mod fixtures;
pub mod http;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Quote;

/// Abstraction over upstream GPU rental price sources.
///
/// Implementors are stateless from the scheduler's point of view: each
/// `fetch_quotes` call produces a fresh, disjoint batch of observations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetch the provider's current GPU price listings.
    async fn fetch_quotes(&self) -> Result<Vec<Quote>>;

    /// Provider name for logging and result attribution.
    fn name(&self) -> &str;
}
