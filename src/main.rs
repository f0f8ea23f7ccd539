use mrp_sniper::config::{load_config, AppConfig};
use mrp_sniper::normalizer::Normalizer;
use mrp_sniper::orchestrator::{CancellationFlag, PriceUpdater, UrlPopulator};
use mrp_sniper::parser::ExtractionChain;
use mrp_sniper::scraper::{HttpFetcher, HttpSearchResolver};
use mrp_sniper::storage::{RecordSource, SqliteStorage};
use std::env;
use std::fs;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("😱 Panic occurred: {:?}", panic_info);
    }));

    let config_path = env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config: AppConfig = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error ({}): {}", config_path, e);
            return;
        }
    };

    let mut storage = match SqliteStorage::new(&config.database_path) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            return;
        }
    };

    if let Some(input_path) = &config.input_path {
        if let Err(e) = import_names(&config, input_path, &mut storage) {
            error!("Reference list import failed: {}", e);
            return;
        }
    }

    // Ctrl-C stops the pass between records; finished records stay persisted
    let cancel = CancellationFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("🛑 Interrupt received, finishing current record...");
                cancel.cancel();
            }
        });
    }

    if config.populate_urls {
        populate_urls(&config, &mut storage, cancel.clone()).await;
    }
    if cancel.is_cancelled() {
        return;
    }

    update_prices(&config, &mut storage, cancel).await;
}

/// Reads the raw name cells, one per line, and inserts the resolved names.
fn import_names(
    config: &AppConfig,
    input_path: &str,
    storage: &mut SqliteStorage,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = fs::read_to_string(input_path)?;
    let normalizer = Normalizer::new(&config.normalizer)?;
    let list = normalizer.build_reference_list(content.lines());
    info!(
        "Reference list: {} names ({} resolved to a unit suffix)",
        list.names.len(),
        list.remapped.len()
    );
    let inserted = storage.import_reference_list(&list)?;
    info!("Imported {} new names from {}", inserted, input_path);
    Ok(())
}

async fn populate_urls(config: &AppConfig, storage: &mut SqliteStorage, cancel: CancellationFlag) {
    let resolver = match HttpSearchResolver::new(&config.search, &config.fetch) {
        Ok(r) => r,
        Err(e) => {
            error!("Search setup failed: {}", e);
            return;
        }
    };
    let records = match storage.load_records() {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to load records: {}", e);
            return;
        }
    };

    info!("Searching source URLs...");
    let populator = UrlPopulator::new(Box::new(resolver), &config.matching, &config.fetch)
        .with_cancellation(cancel);
    populator.run(records, storage).await;
}

async fn update_prices(config: &AppConfig, storage: &mut SqliteStorage, cancel: CancellationFlag) {
    let chain = match ExtractionChain::new(&config.extraction) {
        Ok(c) => c,
        Err(e) => {
            error!("Extraction setup failed: {}", e);
            return;
        }
    };
    let fetcher = match HttpFetcher::new(&config.fetch) {
        Ok(f) => f,
        Err(e) => {
            error!("HTTP client setup failed: {}", e);
            return;
        }
    };
    // re-read so URLs written by the search pass are picked up
    let records = match storage.load_records() {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to load records: {}", e);
            return;
        }
    };

    let order: Vec<&str> = chain.strategies().map(|kind| kind.as_str()).collect();
    info!("Extraction order: {}", order.join(" → "));
    info!("Updating prices for {} records...", records.len());
    let updater = PriceUpdater::new(chain, Box::new(fetcher), &config.fetch).with_cancellation(cancel);
    let report = updater.run(records, storage).await;
    if report.cancelled {
        info!("Stopped early; the next run resumes from the first unpriced record.");
    }
}
