//! REST API — Axum web server over the collection pipeline.
//!
//! Read endpoints serve the latest collected snapshot; a POST refresh
//! endpoint runs a cycle on demand. CORS enabled for local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

pub use routes::{ApiState, SharedState};

/// Start the API server. This spawns a background task — it doesn't block.
pub fn spawn_api(state: SharedState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = std::net::TcpListener::bind(addr)
        .with_context(|| format!("Failed to bind API port {port}"))?;
    listener.set_nonblocking(true).context("Failed to configure API listener")?;

    tokio::spawn(async move {
        info!(port, "API server starting on http://localhost:{port}");
        let listener = match tokio::net::TcpListener::from_std(listener) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, "Failed to adopt API listener");
                return;
            }
        };
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "API server error");
        }
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().expect("static origin"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/prices/latest", get(routes::get_latest))
        .route("/prices/refresh", post(routes::refresh))
        .route("/arbitrage", get(routes::get_arbitrage))
        .route("/arbitrage/best", get(routes::get_best_arbitrage))
        .route("/arbitrage/gpu/:model", get(routes::get_arbitrage_for_gpu))
        .route("/analytics/comparison/:model", get(routes::get_comparison))
        .route("/analytics/trends", get(routes::get_trends))
        .route("/providers/reliability", get(routes::get_reliability))
        .route("/history/:model", get(routes::get_history))
        .route("/gpus/models", get(routes::get_gpu_models))
        .route("/alerts", get(routes::get_alerts))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertNotifier;
    use crate::arbitrage::{ArbitrageDetector, DetectorConfig};
    use crate::cache::QuoteCache;
    use crate::engine::{CollectionScheduler, ExecutionMode, RetryPolicy};
    use crate::normalize::Normalizer;
    use crate::providers::fixtures::default_fleet;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        Arc::new(ApiState {
            scheduler: CollectionScheduler::new(default_fleet(), RetryPolicy::default()),
            mode: ExecutionMode::Concurrent,
            detector: ArbitrageDetector::new(DetectorConfig::default(), Normalizer::default()),
            cache: QuoteCache::new(std::time::Duration::from_secs(300)),
            store: None,
            notifier: AlertNotifier::new(true),
            latest: RwLock::new(Vec::new()),
        })
    }

    async fn get_ok(app: Router, uri: &str) -> serde_json::Value {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let json = get_ok(build_router(test_state()), "/health").await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_latest_endpoint_empty_snapshot() {
        let json = get_ok(build_router(test_state()), "/prices/latest").await;
        assert_eq!(json["count"], 0);
    }

    #[tokio::test]
    async fn test_refresh_then_read_flow() {
        let state = test_state();
        let app = build_router(Arc::clone(&state));

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/prices/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = get_ok(app.clone(), "/prices/latest?gpu_model=A100").await;
        assert!(json["count"].as_u64().unwrap() > 0);

        let json = get_ok(app, "/arbitrage").await;
        assert!(json.as_array().is_some());
    }

    #[tokio::test]
    async fn test_gpu_models_endpoint() {
        let json = get_ok(build_router(test_state()), "/gpus/models").await;
        assert!(!json.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_history_without_store_is_503() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/history/A100").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
