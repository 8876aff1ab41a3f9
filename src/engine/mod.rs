//! Collection engine.
//!
//! Hosts the fan-out scheduler that queries every registered provider,
//! applies per-provider retry with exponential backoff, and aggregates
//! partial results into a single cycle value.

pub mod scheduler;

pub use scheduler::{CollectionScheduler, ExecutionMode, RetryPolicy};
