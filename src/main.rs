//! GPUARB — GPU rental price aggregation and arbitrage detection
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires up the provider fleet, and runs the collect→normalize→detect
//! loop with graceful shutdown. Optionally serves the REST API.

use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

use gpuarb::alerts::AlertNotifier;
use gpuarb::api::{self, ApiState, SharedState};
use gpuarb::arbitrage::ArbitrageDetector;
use gpuarb::cache::QuoteCache;
use gpuarb::config::AppConfig;
use gpuarb::engine::{CollectionScheduler, ExecutionMode, RetryPolicy};
use gpuarb::normalize::Normalizer;
use gpuarb::providers::http::HttpProvider;
use gpuarb::providers::{fixtures, QuoteProvider};
use gpuarb::storage::PriceStore;

const BANNER: &str = r#"
  ____ ____  _   _   _    ____  ____
 / ___|  _ \| | | | / \  |  _ \| __ )
| |  _| |_) | | | |/ _ \ | |_) |  _ \
| |_| |  __/| |_| / ___ \|  _ <| |_) |
 \____|_|    \___/_/   \_\_| \_\____/

  GPU Price Aggregation & Arbitrage Detection
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load_or_default("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        interval_secs = cfg.collector.interval_secs,
        max_attempts = cfg.collector.max_attempts,
        concurrent = cfg.collector.concurrent,
        cache_ttl_secs = cfg.cache.ttl_secs,
        "GPUARB starting up"
    );

    // -- Provider fleet ---------------------------------------------------

    // Built-in fixture fleet, plus one live HTTP endpoint when configured
    // via GPUARB_PRICING_URL / GPUARB_PRICING_NAME / GPUARB_API_KEY.
    let mut providers = fixtures::default_fleet();
    if let Ok(endpoint) = std::env::var("GPUARB_PRICING_URL") {
        let name =
            std::env::var("GPUARB_PRICING_NAME").unwrap_or_else(|_| "Custom".to_string());
        let api_key = std::env::var("GPUARB_API_KEY").ok().map(SecretString::from);
        info!(provider = %name, endpoint = %endpoint, "Registering HTTP provider");
        let live: Arc<dyn QuoteProvider> = Arc::new(HttpProvider::new(name, endpoint, api_key)?);
        providers.push(live);
    }

    let scheduler = CollectionScheduler::new(
        providers,
        RetryPolicy {
            max_attempts: cfg.collector.max_attempts,
            backoff_base: Duration::from_millis(cfg.collector.backoff_base_ms),
        },
    );

    // -- Pipeline components ----------------------------------------------

    let store = if cfg.storage.enabled {
        Some(PriceStore::connect(&cfg.storage.database_url).await?)
    } else {
        info!("Persistence disabled");
        None
    };

    let mode = if cfg.collector.concurrent {
        ExecutionMode::Concurrent
    } else {
        ExecutionMode::Sequential
    };

    let state: SharedState = Arc::new(ApiState {
        scheduler,
        mode,
        detector: ArbitrageDetector::new((&cfg.arbitrage).into(), Normalizer::default()),
        cache: QuoteCache::new(Duration::from_secs(cfg.cache.ttl_secs)),
        store,
        notifier: AlertNotifier::new(cfg.alerts.enabled),
        latest: RwLock::new(Vec::new()),
    });

    if cfg.api.enabled {
        api::spawn_api(Arc::clone(&state), cfg.api.port)?;
    }

    // -- Main loop ---------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.collector.interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.collector.interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = run_cycle(&state).await {
                    error!(error = %e, "Cycle failed — continuing to next");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("GPUARB shut down cleanly.");
    Ok(())
}

/// Run a single collect→persist→detect→alert cycle and refresh the
/// shared snapshot.
async fn run_cycle(state: &SharedState) -> Result<()> {
    let result = state.scheduler.collect(state.mode).await?;

    if let Some(store) = &state.store {
        if let Err(e) = store.insert_batch(&result.quotes).await {
            error!(error = %e, "Failed to persist quotes");
        }
    }

    let opportunities = state.detector.detect(&result.quotes);
    let alerted = state.notifier.alert_opportunities(&opportunities);

    *state.latest.write().await = result.quotes;
    state.cache.clear();

    info!(
        providers_successful = result.providers_successful,
        providers_queried = result.providers_queried,
        total_prices = result.total_prices,
        opportunities = opportunities.len(),
        alerted,
        "Cycle complete"
    );

    for opp in &opportunities {
        info!(opportunity = %opp, "Arbitrage opportunity");
    }

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gpuarb=info"));

    let json_logging = std::env::var("GPUARB_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
