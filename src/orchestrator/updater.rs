use crate::analyzer::summary::{BatchReport, FailedRow};
use crate::config::FetchConfig;
use crate::model::{FetchError, InputRecord, PriceRecord, RecordStatus};
use crate::orchestrator::{CancellationFlag, RetryPolicy};
use crate::parser::ExtractionChain;
use crate::scraper::DocumentFetcher;
use crate::storage::PersistenceSink;
use crate::utils::truncate_diagnostic;
use chrono::Utc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const MAX_DIAGNOSTIC_CHARS: usize = 120;

/// Walks the record list one at a time: skip, fetch, extract, persist.
pub struct PriceUpdater {
    chain: ExtractionChain,
    primary: Box<dyn DocumentFetcher>,
    fallback: Option<Box<dyn DocumentFetcher>>,
    policy: RetryPolicy,
    request_delay: Duration,
    cancel: CancellationFlag,
}

impl PriceUpdater {
    pub fn new(chain: ExtractionChain, primary: Box<dyn DocumentFetcher>, cfg: &FetchConfig) -> Self {
        Self {
            chain,
            primary,
            fallback: None,
            policy: RetryPolicy::new(cfg),
            request_delay: cfg.request_delay(),
            cancel: CancellationFlag::new(),
        }
    }

    /// Second fetcher (e.g. a browser renderer) tried when the primary page has no price.
    pub fn with_fallback(mut self, fallback: Box<dyn DocumentFetcher>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Processes the batch and releases every fetcher session, whatever the outcome.
    pub async fn run<S, I>(&self, records: I, sink: &mut S) -> BatchReport
    where
        S: PersistenceSink,
        I: IntoIterator<Item = InputRecord>,
    {
        let report = self.run_records(records, sink).await;

        self.primary.close().await;
        if let Some(fallback) = &self.fallback {
            fallback.close().await;
        }

        report.log();
        report
    }

    async fn run_records<S, I>(&self, records: I, sink: &mut S) -> BatchReport
    where
        S: PersistenceSink,
        I: IntoIterator<Item = InputRecord>,
    {
        let mut report = BatchReport::default();
        let mut requested_before = false;

        for input in records {
            if self.cancel.is_cancelled() {
                info!("🛑 Cancelled before #{}", input.index);
                report.cancelled = true;
                break;
            }

            let mut record = PriceRecord::from(input);

            let Some(url) = record.url.clone() else {
                record.status = RecordStatus::SkippedNoSource;
                info!("#{} {} | {}", record.index, record.name, record.status);
                report.record(record.index, record.status);
                continue;
            };

            if let Some(price) = record.price {
                record.status = RecordStatus::AlreadyPriced;
                info!("#{} {} | {} (₹{})", record.index, record.name, record.status, price);
                report.record(record.index, record.status);
                continue;
            }

            if requested_before && !self.request_delay.is_zero() {
                sleep(self.request_delay).await;
                if self.cancel.is_cancelled() {
                    info!("🛑 Cancelled before #{}", record.index);
                    report.cancelled = true;
                    break;
                }
            }
            requested_before = true;

            record.status = RecordStatus::InFlight;
            debug!("#{} {} | {}", record.index, record.name, record.status);
            self.process(&mut record, &url).await;
            record.updated_at = Some(Utc::now());

            if let Err(e) = sink.persist(&record) {
                error!("💾 Failed to persist #{} {}: {}", record.index, record.name, e);
                record.status = RecordStatus::Failed;
                record.diagnostic = Some(format!("not persisted: {}", e));
            }

            match record.status {
                RecordStatus::Fetched => info!(
                    "#{} {} | {} (₹{})",
                    record.index,
                    record.name,
                    record.status,
                    record.price.unwrap_or_default()
                ),
                status => {
                    let diagnostic = record.diagnostic.clone().unwrap_or_default();
                    warn!("#{} {} | {} → {}", record.index, record.name, status, diagnostic);
                    report.record_failure(FailedRow {
                        index: record.index,
                        name: record.name.clone(),
                        url: record.url.clone(),
                        diagnostic,
                    });
                }
            }
            report.record(record.index, record.status);
        }

        report
    }

    /// Moves an in-flight record to `fetched`, `failed` or `timed_out`.
    async fn process(&self, record: &mut PriceRecord, url: &str) {
        let result = match self.policy.run(url, || self.primary.fetch(url)).await {
            Ok(doc) => {
                if doc.url != url {
                    debug!("#{} source resolved to {}", record.index, doc.url);
                    record.url = Some(doc.url.clone());
                }
                // parsed and dropped before the next await
                let mut result = self.chain.extract_html(&doc.body);
                if result.is_empty() {
                    if let Some(fallback) = &self.fallback {
                        debug!("No price in static page for {}, trying fallback fetcher", url);
                        match self.policy.run(url, || fallback.fetch(url)).await {
                            Ok(rendered) => result = self.chain.extract_html(&rendered.body),
                            Err(e) => debug!("Fallback fetch failed for {}: {}", url, e),
                        }
                    }
                }
                Ok(result)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(extracted) => match extracted.price.filter(|p| p.is_finite() && *p >= 0.0) {
                Some(price) => {
                    record.price = Some(price);
                    record.status = RecordStatus::Fetched;
                    record.diagnostic = extracted.strategy.map(|s| format!("via {}", s));
                }
                None => {
                    record.status = RecordStatus::Failed;
                    record.diagnostic = Some("price not found in document".to_string());
                }
            },
            Err(FetchError::Timeout) => {
                record.status = RecordStatus::TimedOut;
                record.diagnostic = Some(FetchError::Timeout.to_string());
            }
            Err(e) => {
                record.status = RecordStatus::Failed;
                record.diagnostic = Some(truncate_diagnostic(&e.to_string(), MAX_DIAGNOSTIC_CHARS));
            }
        }
    }
}
