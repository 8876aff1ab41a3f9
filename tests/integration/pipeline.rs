//! End-to-end pipeline tests: collect → normalize → detect, with
//! persistence, caching, and the REST API wired the way the binary
//! wires them.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use uuid::Uuid;

use gpuarb::alerts::AlertNotifier;
use gpuarb::api::{self, ApiState};
use gpuarb::arbitrage::{ArbitrageDetector, DetectorConfig};
use gpuarb::cache::QuoteCache;
use gpuarb::engine::{CollectionScheduler, ExecutionMode, RetryPolicy};
use gpuarb::normalize::Normalizer;
use gpuarb::providers::QuoteProvider;
use gpuarb::storage::PriceStore;

use crate::mock_provider::{quote, MockProvider};

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff_base: Duration::from_millis(2),
    }
}

fn two_provider_fleet() -> Vec<Arc<dyn QuoteProvider>> {
    vec![
        Arc::new(MockProvider::new(
            "X",
            vec![quote("X", "us-east-1", "A100", dec!(30.0), 0.9)],
        )),
        Arc::new(MockProvider::new(
            "Y",
            vec![quote("Y", "us-east-1", "A100", dec!(20.0), 0.95)],
        )),
    ]
}

#[tokio::test]
async fn collect_then_detect_finds_cross_provider_spread() {
    let scheduler = CollectionScheduler::new(two_provider_fleet(), fast_retry(3));
    let result = scheduler.collect(ExecutionMode::Concurrent).await.unwrap();

    assert_eq!(result.providers_successful, 2);
    assert_eq!(result.total_prices, 2);

    let detector = ArbitrageDetector::new(DetectorConfig::default(), Normalizer::default());
    let opportunities = detector.detect(&result.quotes);

    assert_eq!(opportunities.len(), 1);
    let opp = &opportunities[0];
    assert_eq!(opp.gpu_model, "A100");
    assert_eq!(opp.cheapest.quote.provider, "Y");
    assert_eq!(opp.price_difference, dec!(10.0));
    assert!((opp.percentage_savings - 33.33).abs() < 0.01);
}

#[tokio::test]
async fn min_providers_above_fleet_size_yields_nothing() {
    let scheduler = CollectionScheduler::new(two_provider_fleet(), fast_retry(3));
    let result = scheduler.collect(ExecutionMode::Concurrent).await.unwrap();

    let detector = ArbitrageDetector::new(
        DetectorConfig {
            min_providers: 3,
            ..DetectorConfig::default()
        },
        Normalizer::default(),
    );
    assert!(detector.detect(&result.quotes).is_empty());
}

#[tokio::test]
async fn all_providers_failing_still_completes_the_cycle() {
    let a = MockProvider::new("X", Vec::new());
    a.set_error("maintenance window");
    let b = MockProvider::new("Y", Vec::new());
    b.set_error("dns failure");

    let scheduler =
        CollectionScheduler::new(vec![Arc::new(a), Arc::new(b)], fast_retry(2));
    let result = scheduler.collect(ExecutionMode::Concurrent).await.unwrap();

    assert_eq!(result.providers_queried, 2);
    assert_eq!(result.providers_successful, 0);
    assert!(result.quotes.is_empty());
    assert!(result.outcomes.iter().all(|o| !o.success && o.attempts == 2));

    let detector = ArbitrageDetector::new(DetectorConfig::default(), Normalizer::default());
    assert!(detector.detect(&result.quotes).is_empty());
}

#[tokio::test]
async fn flaky_provider_recovers_within_retry_budget() {
    let flaky = Arc::new(MockProvider::with_transient_failures(
        "RunPod",
        vec![quote("RunPod", "us-east", "A100", dec!(1.89), 0.55)],
        2,
    ));
    let scheduler = CollectionScheduler::new(
        vec![Arc::clone(&flaky) as Arc<dyn QuoteProvider>],
        fast_retry(3),
    );

    let result = scheduler.collect(ExecutionMode::Concurrent).await.unwrap();
    assert_eq!(result.providers_successful, 1);
    assert_eq!(result.outcomes[0].attempts, 3);
    assert_eq!(flaky.call_count(), 3);
    assert_eq!(result.total_prices, 1);
}

#[tokio::test]
async fn empty_registry_is_the_only_cycle_error() {
    let scheduler = CollectionScheduler::new(Vec::new(), fast_retry(3));
    assert!(scheduler.collect(ExecutionMode::Concurrent).await.is_err());
}

#[tokio::test]
async fn collected_quotes_survive_a_storage_round_trip() {
    let path = std::env::temp_dir().join(format!("gpuarb-test-{}.db", Uuid::new_v4()));
    let url = format!("sqlite://{}?mode=rwc", path.display());

    let scheduler = CollectionScheduler::new(two_provider_fleet(), fast_retry(3));
    let result = scheduler.collect(ExecutionMode::Sequential).await.unwrap();

    let store = PriceStore::connect(&url).await.unwrap();
    assert_eq!(store.insert_batch(&result.quotes).await.unwrap(), 2);

    let history = store.quotes_for_gpu("A100", 24).await.unwrap();
    assert_eq!(history.len(), 2);

    let detector = ArbitrageDetector::new(DetectorConfig::default(), Normalizer::default());
    let opportunities = detector.detect(&history);
    assert_eq!(opportunities.len(), 1);

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn detection_output_is_deterministic_across_cycles() {
    let fleet: Vec<Arc<dyn QuoteProvider>> = vec![
        Arc::new(MockProvider::new(
            "X",
            vec![
                quote("X", "r1", "A100", dec!(30.0), 0.9),
                quote("X", "r1", "V100", dec!(9.0), 0.9),
                quote("X", "r1", "H100", dec!(6.0), 0.9),
            ],
        )),
        Arc::new(MockProvider::new(
            "Y",
            vec![
                quote("Y", "r1", "A100", dec!(20.0), 0.9),
                quote("Y", "r1", "V100", dec!(6.0), 0.9),
                quote("Y", "r1", "H100", dec!(4.0), 0.9),
            ],
        )),
    ];
    let scheduler = CollectionScheduler::new(fleet, fast_retry(1));
    let detector = ArbitrageDetector::new(DetectorConfig::default(), Normalizer::default());

    let mut orders = Vec::new();
    for _ in 0..3 {
        let result = scheduler.collect(ExecutionMode::Concurrent).await.unwrap();
        let opportunities = detector.detect(&result.quotes);
        orders.push(
            opportunities
                .iter()
                .map(|o| o.gpu_model.clone())
                .collect::<Vec<_>>(),
        );
    }
    assert_eq!(orders[0], orders[1]);
    assert_eq!(orders[1], orders[2]);
    assert_eq!(orders[0].len(), 3);
}

#[tokio::test]
async fn api_refresh_then_query_round_trip() {
    let state = Arc::new(ApiState {
        scheduler: CollectionScheduler::new(two_provider_fleet(), fast_retry(3)),
        mode: ExecutionMode::Concurrent,
        detector: ArbitrageDetector::new(DetectorConfig::default(), Normalizer::default()),
        cache: QuoteCache::new(Duration::from_secs(300)),
        store: None,
        notifier: AlertNotifier::new(true),
        latest: tokio::sync::RwLock::new(Vec::new()),
    });
    let app = api::build_router(Arc::clone(&state));

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

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

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/arbitrage/best")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    let opp: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(opp["gpu_model"], "A100");

    // The refresh also pushed an alert through the notifier.
    assert_eq!(state.notifier.history().len(), 1);
}

#[tokio::test]
async fn cache_short_circuits_recomputation() {
    let cache = QuoteCache::new(Duration::from_secs(300));
    let key = QuoteCache::key(&["arbitrage", "all"]);

    let scheduler = CollectionScheduler::new(two_provider_fleet(), fast_retry(3));
    let detector = ArbitrageDetector::new(DetectorConfig::default(), Normalizer::default());

    let result = scheduler.collect(ExecutionMode::Concurrent).await.unwrap();
    let opportunities = detector.detect(&result.quotes);
    cache.set(key.clone(), serde_json::to_value(&opportunities).unwrap());

    let hit = cache.get(&key).unwrap();
    assert_eq!(hit.as_array().unwrap().len(), 1);
    assert_eq!(hit[0]["gpu_model"], "A100");
}
