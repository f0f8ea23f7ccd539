use crate::analyzer::{MatchClassifier, PopulateReport};
use crate::config::{FetchConfig, MatchConfig};
use crate::model::{InputRecord, MatchTier};
use crate::orchestrator::{CancellationFlag, RetryPolicy};
use crate::scraper::SearchResolver;
use crate::storage::PersistenceSink;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Finds a source URL for every record that lacks one.
pub struct UrlPopulator {
    resolver: Box<dyn SearchResolver>,
    classifier: MatchClassifier,
    accept_tier: MatchTier,
    policy: RetryPolicy,
    request_delay: Duration,
    cancel: CancellationFlag,
}

impl UrlPopulator {
    pub fn new(resolver: Box<dyn SearchResolver>, matching: &MatchConfig, fetch: &FetchConfig) -> Self {
        Self {
            resolver,
            classifier: MatchClassifier::new(matching),
            accept_tier: matching.accept_tier,
            policy: RetryPolicy::new(fetch),
            request_delay: fetch.request_delay(),
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    fn accepts(&self, tier: MatchTier) -> bool {
        tier != MatchTier::NotFound && tier >= self.accept_tier
    }

    pub async fn run<S, I>(&self, records: I, sink: &mut S) -> PopulateReport
    where
        S: PersistenceSink,
        I: IntoIterator<Item = InputRecord>,
    {
        let mut report = PopulateReport::default();
        let mut searched_before = false;

        for input in records {
            if input.source.as_deref().is_some_and(|s| !s.trim().is_empty()) {
                continue;
            }
            if searched_before && !self.request_delay.is_zero() {
                sleep(self.request_delay).await;
            }
            if self.cancel.is_cancelled() {
                info!("🛑 Search cancelled before #{}", input.index);
                report.cancelled = true;
                break;
            }
            searched_before = true;

            let name = input.name.as_str();
            let candidates = match self.policy.run(name, || self.resolver.search(name)).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("⚠ #{} {} → search failed: {}", input.index, name, e);
                    report.record_error();
                    continue;
                }
            };

            let matched = self.classifier.classify_best(name, &candidates);
            let accepted = if self.accepts(matched.tier) {
                matched.candidate_url.as_deref()
            } else {
                None
            };

            if let Err(e) = sink.persist_match(input.index, &matched, accepted) {
                error!("💾 Failed to persist match for #{} {}: {}", input.index, name, e);
                report.record_error();
                continue;
            }

            info!(
                "#{} {} → {} ({:.2}) {}",
                input.index,
                name,
                matched.tier,
                matched.similarity_score,
                matched.candidate_url.as_deref().unwrap_or("-")
            );
            report.record_tier(matched.tier);
            if accepted.is_some() {
                report.urls_written += 1;
            }
        }

        self.resolver.close().await;
        report.log();
        report
    }
}
