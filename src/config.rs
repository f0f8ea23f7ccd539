use crate::model::{ConfigError, MatchTier};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Unit abbreviations pulled up against the preceding token.
    pub unit_tokens: Vec<String>,
    /// Units tried, in priority order, when a name ends in a bare number.
    pub suffix_units: Vec<String>,
    /// Stray delimiters trimmed from both ends of a name.
    pub trim_chars: Vec<char>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            unit_tokens: ["mg", "mcg", "ml", "gm", "iu", "g"].map(String::from).to_vec(),
            suffix_units: ["mg", "ml", "mcg", "gm", "iu"].map(String::from).to_vec(),
            trim_chars: vec!['`', '.'],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferPricePreference {
    /// `highPrice` first, closer to the printed list price.
    HighPrice,
    Price,
}

/// Element attribute pattern marking a price container, e.g. `class` ~ `PriceBox`.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceMarker {
    pub attribute: String,
    pub pattern: String,
}

impl PriceMarker {
    pub fn new(attribute: &str, pattern: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            pattern: pattern.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub payload_selector: String,
    pub payload_price_keys: Vec<String>,
    pub offer_price_preference: OfferPricePreference,
    pub price_markers: Vec<PriceMarker>,
    pub keyword: String,
    pub currency_symbols: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            payload_selector: "script#__NEXT_DATA__".to_string(),
            payload_price_keys: vec!["mrp".to_string(), "MRP".to_string()],
            offer_price_preference: OfferPricePreference::HighPrice,
            price_markers: vec![
                PriceMarker::new("class", "price-tag"),
                PriceMarker::new("class", "DrugHeader__price"),
                PriceMarker::new("class", "ProductCard__price"),
                PriceMarker::new("class", "style__price-tag"),
                PriceMarker::new("class", "PriceBox"),
                PriceMarker::new("itemprop", "^price$"),
            ],
            keyword: "MRP".to_string(),
            currency_symbols: vec!["₹".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub exact_threshold: f64,
    pub close_threshold: f64,
    /// Lowest tier whose candidate URL is written back to the record.
    pub accept_tier: MatchTier,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            exact_threshold: 0.90,
            close_threshold: 0.60,
            accept_tier: MatchTier::Close,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub request_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub rate_limit_backoff_ms: u64,
    pub retry_delay_ms: u64,
    pub jitter_ms: u64,
    pub user_agent: String,
    pub accept_language: String,
}

impl FetchConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Zero delays everywhere; for tests and dry runs against local fixtures.
    pub fn immediate() -> Self {
        Self {
            request_delay_ms: 0,
            rate_limit_backoff_ms: 0,
            retry_delay_ms: 0,
            jitter_ms: 0,
            ..Self::default()
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 1500,
            request_timeout_ms: 30_000,
            max_retries: 3,
            rate_limit_backoff_ms: 5000,
            retry_delay_ms: 2000,
            jitter_ms: 250,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "en-IN,en;q=0.9".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    /// `{query}` is replaced with the url-encoded medicine name.
    pub search_url: String,
    pub product_path_pattern: String,
    pub max_candidates: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.1mg.com".to_string(),
            search_url: "https://www.1mg.com/search/all?name={query}".to_string(),
            product_path_pattern: r"/(?:drugs|otc|homeopathy|ayurveda)/[a-z0-9\-]+-\d+".to_string(),
            max_candidates: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: String,
    /// Plain-text file, one raw cell per line. Skipped when absent.
    pub input_path: Option<String>,
    pub populate_urls: bool,
    pub normalizer: NormalizerConfig,
    pub extraction: ExtractionConfig,
    pub matching: MatchConfig,
    pub fetch: FetchConfig,
    pub search: SearchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "medicines.db".to_string(),
            input_path: None,
            populate_urls: false,
            normalizer: NormalizerConfig::default(),
            extraction: ExtractionConfig::default(),
            matching: MatchConfig::default(),
            fetch: FetchConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}
