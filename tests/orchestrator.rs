use async_trait::async_trait;
use mrp_sniper::config::{ExtractionConfig, FetchConfig, MatchConfig};
use mrp_sniper::model::{
    FetchError, FetchedDocument, InputRecord, MatchRecord, PriceRecord, RecordStatus,
    SearchCandidate, StorageError,
};
use mrp_sniper::normalizer::ReferenceList;
use mrp_sniper::orchestrator::{CancellationFlag, PriceUpdater, UrlPopulator};
use mrp_sniper::parser::ExtractionChain;
use mrp_sniper::scraper::{DocumentFetcher, SearchResolver};
use mrp_sniper::storage::{PersistenceSink, RecordSource, SqliteStorage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

fn priced_page(price: &str) -> String {
    format!(
        r#"<html><head><script type="application/ld+json">
        {{"@type":"Product","offers":{{"price":"{}"}}}}</script></head>
        <body><h1>Product</h1></body></html>"#,
        price
    )
}

const EMPTY_PAGE: &str = "<html><body><h1>Out of stock</h1></body></html>";

/// Scripted fetcher: a fixed response per URL, plus call and close counters.
#[derive(Clone, Default)]
struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, Result<String, FetchError>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
    cancel_after: Option<(usize, CancellationFlag)>,
}

impl MockFetcher {
    fn respond(self, url: &str, response: Result<String, FetchError>) -> Self {
        self.responses.lock().unwrap().insert(url.to_string(), response);
        self
    }

    fn cancelling_after(mut self, calls: usize, flag: CancellationFlag) -> Self {
        self.cancel_after = Some((calls, flag));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self, url: &str) -> usize {
        self.calls().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl DocumentFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        let made = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(url.to_string());
            calls.len()
        };
        if let Some((after, flag)) = &self.cancel_after {
            if made >= *after {
                flag.cancel();
            }
        }
        let response = self
            .responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::NotFound));
        response.map(|body| FetchedDocument {
            url: url.to_string(),
            body,
        })
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn url(n: i64) -> String {
    format!("https://www.1mg.com/drugs/medicine-{}-tablet-{}", n, 1000 + n)
}

/// Five records, all with a source URL; the third is already priced.
fn seeded_storage(dir: &TempDir) -> SqliteStorage {
    let path = dir.path().join("medicines.db");
    let mut storage = SqliteStorage::new(path.to_str().unwrap()).unwrap();
    let names = (1..=5).map(|n| format!("medicine {}mg", n)).collect();
    storage
        .import_reference_list(&ReferenceList {
            names,
            remapped: vec![],
        })
        .unwrap();

    for input in storage.load_records().unwrap() {
        let mut record = PriceRecord::from(input);
        record.url = Some(url(record.index));
        if record.index == 3 {
            record.price = Some(55.0);
            record.status = RecordStatus::Fetched;
        }
        storage.persist(&record).unwrap();
    }
    storage
}

fn reopen(dir: &TempDir) -> SqliteStorage {
    SqliteStorage::new(dir.path().join("medicines.db").to_str().unwrap()).unwrap()
}

fn all_priced(fetcher: MockFetcher) -> MockFetcher {
    (1..=5).fold(fetcher, |f, n| f.respond(&url(n), Ok(priced_page(&format!("{}.50", n * 10)))))
}

fn updater(fetcher: &MockFetcher) -> PriceUpdater {
    updater_with(fetcher, &FetchConfig::immediate())
}

fn updater_with(fetcher: &MockFetcher, cfg: &FetchConfig) -> PriceUpdater {
    let chain = ExtractionChain::new(&ExtractionConfig::default()).unwrap();
    PriceUpdater::new(chain, Box::new(fetcher.clone()), cfg)
}

#[tokio::test]
async fn already_priced_record_is_left_untouched() {
    let dir = TempDir::new().unwrap();
    let mut storage = seeded_storage(&dir);
    let before = storage.get_record(3).unwrap().unwrap();
    let fetcher = all_priced(MockFetcher::default());

    let report = updater(&fetcher).run(storage.load_records().unwrap(), &mut storage).await;

    assert_eq!(report.fetched, 4);
    assert_eq!(report.already_priced, 1);
    assert_eq!(report.status_of(3), Some(RecordStatus::AlreadyPriced));
    assert_eq!(fetcher.call_count(&url(3)), 0);
    assert_eq!(storage.get_record(3).unwrap().unwrap(), before);

    let fourth = storage.get_record(4).unwrap().unwrap();
    assert_eq!(fourth.price, Some(40.5));
    assert_eq!(fourth.status, RecordStatus::Fetched);
}

#[tokio::test]
async fn cancelled_run_resumes_after_last_persisted_record() {
    let dir = TempDir::new().unwrap();
    let mut storage = seeded_storage(&dir);
    let cancel = CancellationFlag::new();
    let first = all_priced(MockFetcher::default()).cancelling_after(2, cancel.clone());

    let report = updater(&first)
        .with_cancellation(cancel)
        .run(storage.load_records().unwrap(), &mut storage)
        .await;

    assert!(report.cancelled);
    assert_eq!(first.calls(), vec![url(1), url(2)]);
    assert_eq!(report.fetched, 2);
    drop(storage);

    // fresh process against the same database file
    let mut storage = reopen(&dir);
    assert_eq!(storage.get_record(2).unwrap().unwrap().price, Some(20.5));
    assert_eq!(storage.get_record(4).unwrap().unwrap().price, None);

    let second = all_priced(MockFetcher::default());
    let report = updater(&second).run(storage.load_records().unwrap(), &mut storage).await;

    assert!(!report.cancelled);
    assert_eq!(second.calls(), vec![url(4), url(5)]);
    assert_eq!(report.already_priced, 3);
    assert_eq!(report.fetched, 2);
    let stored = storage.get_all_records().unwrap();
    assert_eq!(stored.len(), 5);
    assert!(stored.iter().all(|r| r.price.is_some()));
}

#[tokio::test]
async fn persistent_rate_limit_ends_failed() {
    let dir = TempDir::new().unwrap();
    let mut storage = seeded_storage(&dir);
    let fetcher = all_priced(MockFetcher::default()).respond(&url(1), Err(FetchError::RateLimited));

    let report = updater(&fetcher).run(storage.load_records().unwrap(), &mut storage).await;

    // one attempt plus max_retries
    assert_eq!(fetcher.call_count(&url(1)), 4);
    assert_eq!(report.status_of(1), Some(RecordStatus::Failed));
    let stored = storage.get_record(1).unwrap().unwrap();
    assert_eq!(stored.status, RecordStatus::Failed);
    assert!(stored.diagnostic.unwrap().contains("rate limited"));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.fetched, 3);
}

#[tokio::test]
async fn exhausted_timeouts_end_timed_out() {
    let dir = TempDir::new().unwrap();
    let mut storage = seeded_storage(&dir);
    let fetcher = all_priced(MockFetcher::default()).respond(&url(2), Err(FetchError::Timeout));

    let report = updater(&fetcher).run(storage.load_records().unwrap(), &mut storage).await;

    assert_eq!(report.status_of(2), Some(RecordStatus::TimedOut));
    assert_eq!(report.timed_out, 1);
    let stored = storage.get_record(2).unwrap().unwrap();
    assert_eq!(stored.status, RecordStatus::TimedOut);
    assert_eq!(stored.price, None);
}

#[tokio::test]
async fn missing_page_fails_without_retries() {
    let dir = TempDir::new().unwrap();
    let mut storage = seeded_storage(&dir);
    let fetcher = all_priced(MockFetcher::default()).respond(&url(5), Err(FetchError::NotFound));

    let report = updater(&fetcher).run(storage.load_records().unwrap(), &mut storage).await;

    assert_eq!(fetcher.call_count(&url(5)), 1);
    assert_eq!(report.status_of(5), Some(RecordStatus::Failed));
}

#[tokio::test]
async fn page_without_price_is_failed() {
    let dir = TempDir::new().unwrap();
    let mut storage = seeded_storage(&dir);
    let fetcher = all_priced(MockFetcher::default()).respond(&url(1), Ok(EMPTY_PAGE.to_string()));

    let report = updater(&fetcher).run(storage.load_records().unwrap(), &mut storage).await;

    assert_eq!(report.status_of(1), Some(RecordStatus::Failed));
    let stored = storage.get_record(1).unwrap().unwrap();
    assert!(stored.diagnostic.unwrap().contains("price not found"));
}

#[tokio::test]
async fn record_without_source_is_skipped() {
    let records = vec![InputRecord {
        index: 1,
        name: "orphan 10mg".to_string(),
        source: Some("   ".to_string()),
        existing_price: None,
    }];
    let fetcher = MockFetcher::default();
    let mut sink = RecordingSink::default();

    let report = updater(&fetcher).run(records, &mut sink).await;

    assert_eq!(report.status_of(1), Some(RecordStatus::SkippedNoSource));
    assert!(fetcher.calls().is_empty());
    assert!(sink.persisted.is_empty());
}

#[tokio::test]
async fn fetchers_are_closed_even_when_cancelled_up_front() {
    let dir = TempDir::new().unwrap();
    let mut storage = seeded_storage(&dir);
    let primary = all_priced(MockFetcher::default());
    let fallback = MockFetcher::default();
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let report = updater(&primary)
        .with_fallback(Box::new(fallback.clone()))
        .with_cancellation(cancel)
        .run(storage.load_records().unwrap(), &mut storage)
        .await;

    assert!(report.cancelled);
    assert_eq!(report.total, 0);
    assert!(primary.calls().is_empty());
    assert_eq!(primary.closed.load(Ordering::SeqCst), 1);
    assert_eq!(fallback.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fallback_fetcher_used_when_static_page_has_no_price() {
    let dir = TempDir::new().unwrap();
    let mut storage = seeded_storage(&dir);
    let primary = all_priced(MockFetcher::default()).respond(&url(1), Ok(EMPTY_PAGE.to_string()));
    let fallback = MockFetcher::default().respond(&url(1), Ok(priced_page("77")));

    let report = updater(&primary)
        .with_fallback(Box::new(fallback.clone()))
        .run(storage.load_records().unwrap(), &mut storage)
        .await;

    assert_eq!(report.status_of(1), Some(RecordStatus::Fetched));
    assert_eq!(storage.get_record(1).unwrap().unwrap().price, Some(77.0));
    // only consulted for the page that needed it
    assert_eq!(fallback.calls(), vec![url(1)]);
}

#[tokio::test(start_paused = true)]
async fn request_delay_applies_only_between_fetches() {
    let record = |index: i64, source: Option<String>, price: Option<f64>| InputRecord {
        index,
        name: format!("medicine {}mg", index),
        source,
        existing_price: price,
    };
    let records = vec![
        record(1, Some(url(1)), None),
        record(2, None, None),
        record(3, Some(url(3)), Some(55.0)),
        record(4, Some(url(4)), None),
        record(5, Some(url(5)), None),
    ];
    let fetcher = all_priced(MockFetcher::default());
    let cfg = FetchConfig {
        request_delay_ms: 200,
        ..FetchConfig::immediate()
    };
    let mut sink = RecordingSink::default();

    let started = Instant::now();
    let report = updater_with(&fetcher, &cfg).run(records, &mut sink).await;
    let elapsed = started.elapsed();

    assert_eq!(report.fetched, 3);
    // two waits for three fetches; skipped rows cost nothing
    assert!(elapsed >= Duration::from_millis(400), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(600), "{:?}", elapsed);
}

#[tokio::test]
async fn resolved_source_url_is_persisted() {
    /// Serves every page from a canonical address.
    struct Canonicalizing;

    #[async_trait]
    impl DocumentFetcher for Canonicalizing {
        async fn fetch(&self, _url: &str) -> Result<FetchedDocument, FetchError> {
            Ok(FetchedDocument {
                url: "https://www.1mg.com/drugs/canonical-1".to_string(),
                body: priced_page("12"),
            })
        }
    }

    let records = vec![InputRecord {
        index: 1,
        name: "medicine 1mg".to_string(),
        source: Some("www.1mg.com/drugs/medicine-1".to_string()),
        existing_price: None,
    }];
    let chain = ExtractionChain::new(&ExtractionConfig::default()).unwrap();
    let updater = PriceUpdater::new(chain, Box::new(Canonicalizing), &FetchConfig::immediate());
    let mut sink = RecordingSink::default();

    updater.run(records, &mut sink).await;

    assert_eq!(
        sink.persisted[0].url.as_deref(),
        Some("https://www.1mg.com/drugs/canonical-1")
    );
    assert_eq!(sink.persisted[0].price, Some(12.0));
}

/// In-memory sink; fails for the indices listed in `reject`.
#[derive(Default)]
struct RecordingSink {
    persisted: Vec<PriceRecord>,
    matches: Vec<(i64, MatchRecord, Option<String>)>,
    reject: Vec<i64>,
}

impl PersistenceSink for RecordingSink {
    fn persist(&mut self, record: &PriceRecord) -> Result<(), StorageError> {
        if self.reject.contains(&record.index) {
            return Err(StorageError::NotFound);
        }
        self.persisted.push(record.clone());
        Ok(())
    }

    fn persist_match(
        &mut self,
        index: i64,
        record: &MatchRecord,
        accepted_url: Option<&str>,
    ) -> Result<(), StorageError> {
        self.matches.push((index, record.clone(), accepted_url.map(str::to_string)));
        Ok(())
    }
}

#[tokio::test]
async fn sink_error_marks_record_failed_and_batch_continues() {
    let records: Vec<InputRecord> = (1..=3)
        .map(|n| InputRecord {
            index: n,
            name: format!("medicine {}mg", n),
            source: Some(url(n)),
            existing_price: None,
        })
        .collect();
    let fetcher = all_priced(MockFetcher::default());
    let mut sink = RecordingSink {
        reject: vec![2],
        ..Default::default()
    };

    let report = updater(&fetcher).run(records, &mut sink).await;

    assert_eq!(report.status_of(2), Some(RecordStatus::Failed));
    assert_eq!(report.fetched, 2);
    assert_eq!(sink.persisted.iter().map(|r| r.index).collect::<Vec<_>>(), vec![1, 3]);
    assert!(sink.persisted.iter().all(|r| r.updated_at.is_some()));
}

/// Returns fixed candidates per query name.
#[derive(Clone, Default)]
struct MockResolver {
    results: Arc<Mutex<HashMap<String, Result<Vec<SearchCandidate>, FetchError>>>>,
    searched: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
    cancel_after: Option<(usize, CancellationFlag)>,
}

impl MockResolver {
    fn respond(self, name: &str, result: Result<Vec<SearchCandidate>, FetchError>) -> Self {
        self.results.lock().unwrap().insert(name.to_string(), result);
        self
    }

    fn cancelling_after(mut self, searches: usize, flag: CancellationFlag) -> Self {
        self.cancel_after = Some((searches, flag));
        self
    }

    fn searched(&self) -> Vec<String> {
        self.searched.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchResolver for MockResolver {
    async fn search(&self, name: &str) -> Result<Vec<SearchCandidate>, FetchError> {
        let made = {
            let mut searched = self.searched.lock().unwrap();
            searched.push(name.to_string());
            searched.len()
        };
        if let Some((after, flag)) = &self.cancel_after {
            if made >= *after {
                flag.cancel();
            }
        }
        self.results
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn candidate(name: &str, url: &str) -> SearchCandidate {
    SearchCandidate {
        name: name.to_string(),
        url: url.to_string(),
    }
}

#[tokio::test]
async fn populate_writes_only_accepted_urls() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("medicines.db");
    let mut storage = SqliteStorage::new(path.to_str().unwrap()).unwrap();
    storage
        .import_reference_list(&ReferenceList {
            names: vec![
                "crocin advance".to_string(),
                "dolo 650".to_string(),
                "unknown thing".to_string(),
                "zzz".to_string(),
            ],
            remapped: vec![],
        })
        .unwrap();

    let dolo = "https://www.1mg.com/drugs/dolo-650-tablet-74467";
    let resolver = MockResolver::default()
        .respond(
            "dolo 650",
            Ok(vec![
                candidate("Crocin Pain Relief", "https://www.1mg.com/drugs/crocin-1"),
                candidate("Dolo 650", dolo),
            ]),
        )
        .respond(
            "crocin advance",
            Ok(vec![candidate("Xyzzy Syrup", "https://www.1mg.com/otc/xyzzy-9")]),
        )
        .respond("zzz", Err(FetchError::Network("connection reset".to_string())));

    let populator = UrlPopulator::new(
        Box::new(resolver.clone()),
        &MatchConfig::default(),
        &FetchConfig::immediate(),
    );
    let report = populator.run(storage.load_records().unwrap(), &mut storage).await;

    assert_eq!(report.searched, 4);
    assert_eq!(report.exact, 1);
    assert_eq!(report.not_found, 1);
    assert_eq!(report.errors, 1);
    assert_eq!(report.urls_written, 1);
    assert_eq!(resolver.closed.load(Ordering::SeqCst), 1);

    let records = storage.load_records().unwrap();
    let by_name = |name: &str| records.iter().find(|r| r.name == name).unwrap().clone();
    assert_eq!(by_name("dolo 650").source.as_deref(), Some(dolo));
    assert_eq!(by_name("crocin advance").source, None);
    assert_eq!(by_name("unknown thing").source, None);

    let stored = storage.get_match("unknown thing").unwrap().unwrap();
    assert_eq!(stored.candidate_url, None);
    // search errors are not stored so the next run retries them
    assert!(storage.get_match("zzz").unwrap().is_none());
}

#[tokio::test]
async fn populate_skips_records_that_already_have_a_source() {
    let records = vec![InputRecord {
        index: 1,
        name: "dolo 650".to_string(),
        source: Some("https://www.1mg.com/drugs/dolo-650-tablet-74467".to_string()),
        existing_price: None,
    }];
    let resolver = MockResolver::default();
    let mut sink = RecordingSink::default();

    let populator = UrlPopulator::new(
        Box::new(resolver.clone()),
        &MatchConfig::default(),
        &FetchConfig::immediate(),
    );
    let report = populator.run(records, &mut sink).await;

    assert_eq!(report.searched, 0);
    assert!(sink.matches.is_empty());
    assert_eq!(resolver.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn populate_stops_at_record_boundary_when_cancelled() {
    let records: Vec<InputRecord> = ["alpha 5mg", "beta 10mg", "gamma 20mg"]
        .iter()
        .enumerate()
        .map(|(i, name)| InputRecord {
            index: i as i64 + 1,
            name: name.to_string(),
            source: None,
            existing_price: None,
        })
        .collect();
    let cancel = CancellationFlag::new();
    let resolver = MockResolver::default()
        .respond(
            "alpha 5mg",
            Ok(vec![candidate("Alpha 5mg", "https://www.1mg.com/drugs/alpha-5mg-1")]),
        )
        .cancelling_after(1, cancel.clone());
    let mut sink = RecordingSink::default();

    let populator = UrlPopulator::new(
        Box::new(resolver.clone()),
        &MatchConfig::default(),
        &FetchConfig::immediate(),
    )
    .with_cancellation(cancel);
    let report = populator.run(records, &mut sink).await;

    assert!(report.cancelled);
    assert_eq!(resolver.searched(), vec!["alpha 5mg".to_string()]);
    // the in-flight search still finishes and is stored
    assert_eq!(sink.matches.len(), 1);
    assert_eq!(sink.matches[0].0, 1);
    assert_eq!(sink.matches[0].2.as_deref(), Some("https://www.1mg.com/drugs/alpha-5mg-1"));
    assert_eq!(resolver.closed.load(Ordering::SeqCst), 1);
}
