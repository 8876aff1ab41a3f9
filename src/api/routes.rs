//! REST API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`; read
//! endpoints serve from the latest collected snapshot, with the TTL
//! cache in front of the filter/compute work.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::alerts::AlertNotifier;
use crate::analytics;
use crate::arbitrage::{ArbitrageDetector, Opportunity, ProviderComparison};
use crate::cache::QuoteCache;
use crate::engine::{CollectionScheduler, ExecutionMode};
use crate::normalize::specs::GPU_SPECS;
use crate::storage::PriceStore;
use crate::types::Quote;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub scheduler: CollectionScheduler,
    pub mode: ExecutionMode,
    pub detector: ArbitrageDetector,
    pub cache: QuoteCache,
    pub store: Option<PriceStore>,
    pub notifier: AlertNotifier,
    /// Quotes from the most recent collection cycle.
    pub latest: RwLock<Vec<Quote>>,
}

pub type SharedState = Arc<ApiState>;

type ApiError = (StatusCode, Json<Value>);

fn not_found(message: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message.into() })))
}

fn internal(message: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message.to_string() })),
    )
}

// ---------------------------------------------------------------------------
// Query / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub gpu_model: Option<String>,
    pub provider: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    pub gpu_model: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub hours: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub providers_queried: usize,
    pub providers_successful: usize,
    pub total_prices: usize,
    pub opportunities_found: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GpuModelEntry {
    pub model: String,
    pub tflops_fp32: f64,
    pub tflops_fp16: f64,
    pub tflops_tensor: f64,
    pub memory_gb: u32,
    pub architecture: String,
    pub release_year: u16,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health(State(state): State<SharedState>) -> Json<Value> {
    let quote_count = state.latest.read().await.len();
    Json(json!({
        "status": "ok",
        "providers": state.scheduler.provider_count(),
        "quotes": quote_count,
        "cache": state.cache.stats(),
    }))
}

/// GET /prices/latest
pub async fn get_latest(
    State(state): State<SharedState>,
    Query(q): Query<LatestQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit.unwrap_or(100);
    let key = QuoteCache::key(&[
        "latest",
        q.gpu_model.as_deref().unwrap_or("all"),
        q.provider.as_deref().unwrap_or("all"),
        &limit.to_string(),
    ]);
    if let Some(hit) = state.cache.get(&key) {
        return Ok(Json(hit));
    }

    let latest = state.latest.read().await;
    let quotes: Vec<&Quote> = latest
        .iter()
        .filter(|quote| match &q.gpu_model {
            Some(m) => quote.gpu_model.eq_ignore_ascii_case(m),
            None => true,
        })
        .filter(|quote| match &q.provider {
            Some(p) => quote.provider.eq_ignore_ascii_case(p),
            None => true,
        })
        .take(limit)
        .collect();

    let body = json!({ "count": quotes.len(), "quotes": quotes });
    state.cache.set(key, body.clone());
    Ok(Json(body))
}

/// POST /prices/refresh
///
/// Runs one collection cycle inline, replaces the snapshot, persists to
/// the store when configured, and invalidates the cache.
pub async fn refresh(State(state): State<SharedState>) -> Result<Json<RefreshResponse>, ApiError> {
    let result = state.scheduler.collect(state.mode).await.map_err(internal)?;

    if let Some(store) = &state.store {
        store.insert_batch(&result.quotes).await.map_err(internal)?;
    }

    let opportunities = state.detector.detect(&result.quotes);
    state.notifier.alert_opportunities(&opportunities);

    *state.latest.write().await = result.quotes.clone();
    state.cache.clear();

    info!(
        total_prices = result.total_prices,
        opportunities = opportunities.len(),
        "Refresh complete"
    );
    Ok(Json(RefreshResponse {
        providers_queried: result.providers_queried,
        providers_successful: result.providers_successful,
        total_prices: result.total_prices,
        opportunities_found: opportunities.len(),
        elapsed_ms: result.elapsed.as_millis() as u64,
    }))
}

/// GET /arbitrage
pub async fn get_arbitrage(State(state): State<SharedState>) -> Json<Vec<Opportunity>> {
    let latest = state.latest.read().await;
    Json(state.detector.detect(&latest))
}

/// GET /arbitrage/best
pub async fn get_best_arbitrage(
    State(state): State<SharedState>,
) -> Result<Json<Opportunity>, ApiError> {
    let latest = state.latest.read().await;
    state
        .detector
        .best(&latest)
        .map(Json)
        .ok_or_else(|| not_found("no qualifying opportunity"))
}

/// GET /arbitrage/gpu/:model
pub async fn get_arbitrage_for_gpu(
    State(state): State<SharedState>,
    Path(model): Path<String>,
) -> Result<Json<Opportunity>, ApiError> {
    let latest = state.latest.read().await;
    state
        .detector
        .for_gpu(&latest, &model)
        .map(Json)
        .ok_or_else(|| not_found(format!("no qualifying opportunity for {model}")))
}

/// GET /analytics/comparison/:model
pub async fn get_comparison(
    State(state): State<SharedState>,
    Path(model): Path<String>,
) -> Result<Json<ProviderComparison>, ApiError> {
    let latest = state.latest.read().await;
    state
        .detector
        .compare_providers(&latest, &model)
        .map(Json)
        .ok_or_else(|| not_found(format!("no offers for {model}")))
}

/// GET /analytics/trends
pub async fn get_trends(
    State(state): State<SharedState>,
    Query(q): Query<TrendsQuery>,
) -> Result<Json<analytics::TrendReport>, ApiError> {
    let latest = state.latest.read().await;
    analytics::price_trends(&latest, q.gpu_model.as_deref(), q.provider.as_deref())
        .map(Json)
        .ok_or_else(|| not_found("no quotes match the requested filters"))
}

/// GET /providers/reliability
pub async fn get_reliability(
    State(state): State<SharedState>,
) -> Json<Vec<analytics::ReliabilityScore>> {
    let latest = state.latest.read().await;
    Json(analytics::provider_reliability(&latest))
}

/// GET /history/:model
pub async fn get_history(
    State(state): State<SharedState>,
    Path(model): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let Some(store) = &state.store else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "persistence is disabled" })),
        ));
    };
    let hours = q.hours.unwrap_or(24);
    let quotes = store.quotes_for_gpu(&model, hours).await.map_err(internal)?;
    Ok(Json(json!({
        "gpu_model": model,
        "hours": hours,
        "count": quotes.len(),
        "quotes": quotes,
    })))
}

/// GET /gpus/models
pub async fn get_gpu_models() -> Json<Vec<GpuModelEntry>> {
    Json(
        GPU_SPECS
            .iter()
            .map(|spec| GpuModelEntry {
                model: spec.model.to_string(),
                tflops_fp32: spec.tflops_fp32,
                tflops_fp16: spec.tflops_fp16,
                tflops_tensor: spec.tflops_tensor,
                memory_gb: spec.memory_gb,
                architecture: spec.architecture.to_string(),
                release_year: spec.release_year,
            })
            .collect(),
    )
}

/// GET /alerts
pub async fn get_alerts(State(state): State<SharedState>) -> Json<Vec<crate::alerts::Alert>> {
    Json(state.notifier.history())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
