//! GPUARB — GPU rental price aggregation and arbitrage detection
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod providers;
pub mod engine;
pub mod normalize;
pub mod arbitrage;
pub mod cache;
pub mod analytics;
pub mod alerts;
pub mod storage;
pub mod api;
