use crate::model::{MatchTier, RecordStatus};
use tracing::{info, warn};

/// A record that ended in `failed` or `timed_out`.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRow {
    pub index: i64,
    pub name: String,
    pub url: Option<String>,
    pub diagnostic: String,
}

/// Aggregate outcome of one price-update pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub total: usize,
    pub fetched: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub skipped_no_source: usize,
    pub already_priced: usize,
    pub cancelled: bool,
    pub outcomes: Vec<(i64, RecordStatus)>,
    pub failures: Vec<FailedRow>,
}

impl BatchReport {
    pub fn record(&mut self, index: i64, status: RecordStatus) {
        self.total += 1;
        match status {
            RecordStatus::Fetched => self.fetched += 1,
            RecordStatus::Failed => self.failed += 1,
            RecordStatus::TimedOut => self.timed_out += 1,
            RecordStatus::SkippedNoSource => self.skipped_no_source += 1,
            RecordStatus::AlreadyPriced => self.already_priced += 1,
            RecordStatus::Pending | RecordStatus::InFlight => {}
        }
        self.outcomes.push((index, status));
    }

    pub fn record_failure(&mut self, row: FailedRow) {
        self.failures.push(row);
    }

    pub fn status_of(&self, index: i64) -> Option<RecordStatus> {
        self.outcomes
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, status)| *status)
    }

    pub fn log(&self) {
        info!(
            "📊 Batch done: total={} fetched={} failed={} timed_out={} skipped_no_source={} already_priced={}{}",
            self.total,
            self.fetched,
            self.failed,
            self.timed_out,
            self.skipped_no_source,
            self.already_priced,
            if self.cancelled { " (cancelled)" } else { "" }
        );
        for row in &self.failures {
            warn!(
                "❌ #{} {} [{}]: {}",
                row.index,
                row.name,
                row.url.as_deref().unwrap_or("-"),
                row.diagnostic
            );
        }
    }
}

/// Aggregate outcome of one URL-population pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulateReport {
    pub searched: usize,
    pub exact: usize,
    pub close: usize,
    pub low: usize,
    pub not_found: usize,
    pub errors: usize,
    pub urls_written: usize,
    pub cancelled: bool,
}

impl PopulateReport {
    pub fn record_tier(&mut self, tier: MatchTier) {
        self.searched += 1;
        match tier {
            MatchTier::Exact => self.exact += 1,
            MatchTier::Close => self.close += 1,
            MatchTier::Low => self.low += 1,
            MatchTier::NotFound => self.not_found += 1,
        }
    }

    pub fn record_error(&mut self) {
        self.searched += 1;
        self.errors += 1;
    }

    pub fn success_rate(&self) -> Option<f64> {
        (self.searched > 0).then(|| (self.exact + self.close) as f64 / self.searched as f64)
    }

    pub fn log(&self) {
        info!(
            "🔎 Search done: searched={} exact={} close={} low={} not_found={} errors={} urls_written={}{}",
            self.searched,
            self.exact,
            self.close,
            self.low,
            self.not_found,
            self.errors,
            self.urls_written,
            if self.cancelled { " (cancelled)" } else { "" }
        );
        if let Some(rate) = self.success_rate() {
            info!("Success rate: {:.1}%", rate * 100.0);
        }
    }
}
