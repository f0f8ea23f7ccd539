// Core structs: PriceRecord, MatchRecord, ExtractionResult and the error enums
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Normalized, deduplicated key for one logical medicine entry.
pub type CanonicalName = String;

/// Every canonical name observed in one corpus pass. Built once, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    names: HashSet<CanonicalName>,
}

impl ReferenceSet {
    pub fn new<I>(names: I) -> Self
    where
        I: IntoIterator<Item = CanonicalName>,
    {
        Self {
            names: names.into_iter().filter(|n| !n.is_empty()).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<CanonicalName> for ReferenceSet {
    fn from_iter<T: IntoIterator<Item = CanonicalName>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Which extraction strategy produced a value. Declaration order is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    EmbeddedPayload,
    LinkedData,
    MarkedElement,
    KeywordScan,
    CurrencyScan,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::EmbeddedPayload => "embedded_payload",
            StrategyKind::LinkedData => "linked_data",
            StrategyKind::MarkedElement => "marked_element",
            StrategyKind::KeywordScan => "keyword_scan",
            StrategyKind::CurrencyScan => "currency_scan",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of running the extraction chain over one document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractionResult {
    pub raw_value: Option<String>,
    pub price: Option<f64>,
    pub strategy: Option<StrategyKind>,
}

impl ExtractionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.price.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    NotFound,
    Low,
    Close,
    Exact,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Exact => "exact",
            MatchTier::Close => "close",
            MatchTier::Low => "low",
            MatchTier::NotFound => "not_found",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exact" => Some(MatchTier::Exact),
            "close" => Some(MatchTier::Close),
            "low" => Some(MatchTier::Low),
            "not_found" => Some(MatchTier::NotFound),
            _ => None,
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of comparing a query name with one search candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub query_name: String,
    pub candidate_name: Option<String>,
    pub candidate_url: Option<String>,
    pub similarity_score: f64,
    pub tier: MatchTier,
}

/// A product link found on a search results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    Pending,
    SkippedNoSource,
    AlreadyPriced,
    InFlight,
    Fetched,
    Failed,
    TimedOut,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::SkippedNoSource => "skipped_no_source",
            RecordStatus::AlreadyPriced => "already_priced",
            RecordStatus::InFlight => "in_flight",
            RecordStatus::Fetched => "fetched",
            RecordStatus::Failed => "failed",
            RecordStatus::TimedOut => "timed_out",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "skipped_no_source" => RecordStatus::SkippedNoSource,
            "already_priced" => RecordStatus::AlreadyPriced,
            "in_flight" => RecordStatus::InFlight,
            "fetched" => RecordStatus::Fetched,
            "failed" => RecordStatus::Failed,
            "timed_out" => RecordStatus::TimedOut,
            _ => RecordStatus::Pending,
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row handed to the orchestrator by the record source.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRecord {
    pub index: i64,
    pub name: String,
    pub source: Option<String>,
    pub existing_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub index: i64,
    pub name: String,
    pub url: Option<String>,
    pub price: Option<f64>,
    pub status: RecordStatus,
    pub diagnostic: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<InputRecord> for PriceRecord {
    fn from(input: InputRecord) -> Self {
        Self {
            index: input.index,
            name: input.name,
            url: input.source.filter(|s| !s.trim().is_empty()),
            price: input.existing_price,
            status: RecordStatus::Pending,
            diagnostic: None,
            updated_at: None,
        }
    }
}

/// A fetched document before parsing. Parsing happens on the caller's side
/// so the fetcher stays `Send`.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub url: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by host")]
    RateLimited,
    #[error("document not found")]
    NotFound,
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::NotFound)
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("record not found")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid scan pattern `{pattern}`: {source}")]
    InvalidScanPattern {
        pattern: String,
        #[source]
        source: Box<fancy_regex::Error>,
    },
    #[error("invalid selector `{0}`")]
    InvalidSelector(String),
    #[error("invalid url `{0}`")]
    InvalidUrl(String),
    #[error("http client setup failed: {0}")]
    HttpClient(String),
}
