// The five price extraction strategies, highest priority first.
use super::document::ParsedDocument;
use super::json_walk::{find_key, scalar_text};
use super::numeric::{compile_anchored, first_capture};
use super::PriceStrategy;
use crate::config::{ExtractionConfig, OfferPricePreference, PriceMarker};
use crate::model::{ConfigError, StrategyKind};
use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

fn compile_selector(raw: &str) -> Result<Selector, ConfigError> {
    Selector::parse(raw).map_err(|_| ConfigError::InvalidSelector(raw.to_string()))
}

fn compile_regex(pattern: String) -> Result<Regex, ConfigError> {
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ConfigError::InvalidPattern { pattern, source })
}

fn currency_alternation(symbols: &[String]) -> String {
    symbols
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|")
}

/// Known-shape envelope of the page's serialized state blob.
#[derive(Debug, Deserialize)]
struct EmbeddedPayload {
    #[serde(default)]
    props: EmbeddedProps,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddedProps {
    #[serde(default, rename = "pageProps")]
    page_props: Value,
}

/// Strategy 1: the serialized page-state script block.
pub struct EmbeddedPayloadStrategy {
    selector: Selector,
    keys: Vec<String>,
}

impl EmbeddedPayloadStrategy {
    pub fn new(cfg: &ExtractionConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            selector: compile_selector(&cfg.payload_selector)?,
            keys: cfg.payload_price_keys.clone(),
        })
    }
}

impl PriceStrategy for EmbeddedPayloadStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::EmbeddedPayload
    }

    fn attempt(&self, doc: &ParsedDocument) -> Option<String> {
        let script = doc.html().select(&self.selector).next()?;
        let raw = script.text().collect::<String>();
        let payload: EmbeddedPayload = match serde_json::from_str(&raw) {
            Ok(p) => p,
            Err(e) => {
                debug!("Embedded payload is not valid JSON: {}", e);
                return None;
            }
        };
        // the price lives somewhere under pageProps; its exact path varies per page type
        self.keys
            .iter()
            .find_map(|key| find_key(&payload.props.page_props, key).and_then(scalar_text))
    }
}

#[derive(Debug, Deserialize)]
struct LinkedProduct {
    #[serde(default)]
    offers: Option<LinkedOffers>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LinkedOffers {
    // tried first: a derived struct would also accept a JSON array
    Many(Vec<LinkedOffer>),
    One(LinkedOffer),
}

#[derive(Debug, Deserialize)]
struct LinkedOffer {
    #[serde(default, rename = "highPrice")]
    high_price: Option<Value>,
    #[serde(default)]
    price: Option<Value>,
}

impl LinkedOffer {
    fn price_text(&self, preference: OfferPricePreference) -> Option<String> {
        let high = || self.high_price.as_ref().and_then(scalar_text);
        let plain = || self.price.as_ref().and_then(scalar_text);
        match preference {
            OfferPricePreference::HighPrice => high().or_else(plain),
            OfferPricePreference::Price => plain().or_else(high),
        }
    }
}

/// Strategy 2: `application/ld+json` product metadata.
pub struct LinkedDataStrategy {
    selector: Selector,
    preference: OfferPricePreference,
}

impl LinkedDataStrategy {
    pub fn new(cfg: &ExtractionConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            selector: compile_selector(r#"script[type="application/ld+json"]"#)?,
            preference: cfg.offer_price_preference,
        })
    }

    fn from_item(&self, item: &Value) -> Option<String> {
        if !item.is_object() {
            return None;
        }
        let product: LinkedProduct = serde_json::from_value(item.clone()).ok()?;
        let offer = match product.offers? {
            LinkedOffers::One(offer) => offer,
            LinkedOffers::Many(list) => list.into_iter().next()?,
        };
        offer.price_text(self.preference)
    }
}

impl PriceStrategy for LinkedDataStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LinkedData
    }

    fn attempt(&self, doc: &ParsedDocument) -> Option<String> {
        for script in doc.html().select(&self.selector) {
            let raw = script.text().collect::<String>();
            let Ok(data) = serde_json::from_str::<Value>(&raw) else {
                continue;
            };
            let items = match &data {
                Value::Array(list) => list.iter().collect::<Vec<_>>(),
                other => vec![other],
            };
            if let Some(price) = items.into_iter().find_map(|item| self.from_item(item)) {
                return Some(price);
            }
        }
        None
    }
}

struct CompiledMarker {
    attribute: String,
    pattern: Regex,
}

impl CompiledMarker {
    fn matches(&self, el: &ElementRef) -> bool {
        el.value()
            .attr(&self.attribute)
            .is_some_and(|v| v.split_whitespace().any(|token| self.pattern.is_match(token)))
    }
}

/// Strategy 3: elements carrying a known price-marker class or attribute.
pub struct MarkedElementStrategy {
    markers: Vec<CompiledMarker>,
    any_element: Selector,
    token: fancy_regex::Regex,
}

impl MarkedElementStrategy {
    pub fn new(cfg: &ExtractionConfig) -> Result<Self, ConfigError> {
        let markers = cfg
            .price_markers
            .iter()
            .map(|PriceMarker { attribute, pattern }| {
                Ok(CompiledMarker {
                    attribute: attribute.clone(),
                    pattern: compile_regex(pattern.clone())?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self {
            markers,
            any_element: compile_selector("*")?,
            token: compile_anchored("")?,
        })
    }
}

impl PriceStrategy for MarkedElementStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MarkedElement
    }

    fn attempt(&self, doc: &ParsedDocument) -> Option<String> {
        // only the first element per marker is considered
        for marker in &self.markers {
            let Some(el) = doc.html().select(&self.any_element).find(|el| marker.matches(el)) else {
                continue;
            };
            let text = el.text().map(str::trim).collect::<String>();
            if let Some(token) = first_capture(&self.token, &text) {
                return Some(token.to_string());
            }
        }
        None
    }
}

/// Strategy 4: "MRP", optional `:`/`-`, optional currency, then a number.
pub struct KeywordScanStrategy {
    pattern: fancy_regex::Regex,
}

impl KeywordScanStrategy {
    pub fn new(cfg: &ExtractionConfig) -> Result<Self, ConfigError> {
        let currency = currency_alternation(&cfg.currency_symbols);
        let currency = if currency.is_empty() {
            String::new()
        } else {
            format!(r"(?:{})?\s*", currency)
        };
        let prefix = format!(r"{}\s*[:\-]?\s*{}", regex::escape(&cfg.keyword), currency);
        Ok(Self {
            pattern: compile_anchored(&prefix)?,
        })
    }
}

impl PriceStrategy for KeywordScanStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::KeywordScan
    }

    fn attempt(&self, doc: &ParsedDocument) -> Option<String> {
        first_capture(&self.pattern, doc.visible_text()).map(str::to_string)
    }
}

/// Strategy 5: the first number directly after a currency symbol.
pub struct CurrencyScanStrategy {
    pattern: Option<fancy_regex::Regex>,
}

impl CurrencyScanStrategy {
    pub fn new(cfg: &ExtractionConfig) -> Result<Self, ConfigError> {
        let currency = currency_alternation(&cfg.currency_symbols);
        let pattern = if currency.is_empty() {
            None
        } else {
            Some(compile_anchored(&format!(r"(?:{})\s*", currency))?)
        };
        Ok(Self { pattern })
    }
}

impl PriceStrategy for CurrencyScanStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CurrencyScan
    }

    fn attempt(&self, doc: &ParsedDocument) -> Option<String> {
        let pattern = self.pattern.as_ref()?;
        first_capture(pattern, doc.visible_text()).map(str::to_string)
    }
}
