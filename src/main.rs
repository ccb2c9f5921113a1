//! Strata demo: a memory layer in front of a slow simulated backing store.
//!
//! Issues a burst of concurrent lookups to show that one traversal serves
//! every caller, then reads again to show the memory layer answering.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::join_all;
use tracing_subscriber::{EnvFilter, fmt};

use strata_cache::{CacheManager, CacheOptions, LayerFns};
use strata_core::config::AppConfig;
use strata_core::error::AppError;

#[tokio::main]
async fn main() {
    let env = std::env::var("STRATA_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

/// Route Strata's own crates at the configured level; `RUST_LOG` overrides.
fn init_logging(config: &AppConfig) {
    let level = &config.logging.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,strata_demo={level},strata_core={level},strata_cache={level}"
        ))
    });
    let subscriber = fmt().with_env_filter(filter).with_target(true);

    if config.logging.format == "json" {
        subscriber.json().with_current_span(false).init();
    } else {
        subscriber.compact().init();
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        memory_disabled = config.cache.memory.disabled,
        memory_ttl_ms = config.cache.memory.ttl_ms,
        "Starting Strata demo"
    );

    let store_reads = Arc::new(AtomicUsize::new(0));
    let reads = Arc::clone(&store_reads);

    let backing_store = LayerFns::new().named("backing-store").with_get(move |key: String| {
        let reads = Arc::clone(&reads);
        async move {
            reads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(250)).await;
            if key.starts_with("missing") {
                Ok(None)
            } else {
                Ok(Some(format!("record for {key}")))
            }
        }
    });

    let cache: CacheManager<String, String> = CacheManager::new(
        CacheOptions::new()
            .layer_fns(backing_store)
            .config(&config.cache),
    )?;

    let key = "user:42".to_string();
    let burst = join_all((0..10).map(|_| cache.get(&key))).await;
    for result in burst {
        let value = result?;
        tracing::info!(key = %key, value = ?value, "Burst lookup");
    }
    tracing::info!(
        reads = store_reads.load(Ordering::SeqCst),
        "Backing store reads after burst"
    );

    let keys = vec![key.clone(), "missing:1".to_string(), "user:7".to_string()];
    for (key, result) in keys.iter().zip(cache.get_many(&keys).await) {
        let value = result?;
        tracing::info!(key = %key, value = ?value, "Batch lookup");
    }

    cache.clear(&key).await;
    tracing::info!(
        cached = cache.memory().map(|m| m.len()).unwrap_or(0),
        reads = store_reads.load(Ordering::SeqCst),
        "Demo complete"
    );

    Ok(())
}
