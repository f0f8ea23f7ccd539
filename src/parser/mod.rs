// Parser module: price extraction chain and search-result parsing.

pub mod document;
pub mod json_walk;
pub mod numeric;
pub mod search;
pub mod strategies;

pub use document::ParsedDocument;
pub use search::SearchResultParser;

use crate::config::ExtractionConfig;
use crate::model::{ConfigError, ExtractionResult, StrategyKind};
use strategies::{
    CurrencyScanStrategy, EmbeddedPayloadStrategy, KeywordScanStrategy, LinkedDataStrategy,
    MarkedElementStrategy,
};
use tracing::debug;

/// One self-contained way of locating a price in a document.
pub trait PriceStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    /// Raw price text, or `None` when this strategy finds nothing.
    fn attempt(&self, doc: &ParsedDocument) -> Option<String>;
}

/// Ordered strategies; the first one yielding a parseable price wins.
pub struct ExtractionChain {
    strategies: Vec<Box<dyn PriceStrategy>>,
}

impl ExtractionChain {
    pub fn new(cfg: &ExtractionConfig) -> Result<Self, ConfigError> {
        let strategies: Vec<Box<dyn PriceStrategy>> = vec![
            Box::new(EmbeddedPayloadStrategy::new(cfg)?),
            Box::new(LinkedDataStrategy::new(cfg)?),
            Box::new(MarkedElementStrategy::new(cfg)?),
            Box::new(KeywordScanStrategy::new(cfg)?),
            Box::new(CurrencyScanStrategy::new(cfg)?),
        ];
        Ok(Self::with_strategies(strategies))
    }

    pub fn with_strategies(strategies: Vec<Box<dyn PriceStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> impl Iterator<Item = StrategyKind> + '_ {
        self.strategies.iter().map(|s| s.kind())
    }

    /// Never fails: a document without any price signal gives an empty result.
    pub fn extract(&self, doc: &ParsedDocument) -> ExtractionResult {
        for strategy in &self.strategies {
            let Some(raw) = strategy.attempt(doc) else {
                continue;
            };
            match numeric::parse_price(&raw) {
                Some(price) => {
                    debug!("Price {} found by {}", price, strategy.kind());
                    return ExtractionResult {
                        raw_value: Some(raw),
                        price: Some(price),
                        strategy: Some(strategy.kind()),
                    };
                }
                None => debug!("{} returned unparseable value {:?}", strategy.kind(), raw),
            }
        }
        ExtractionResult::empty()
    }

    pub fn extract_html(&self, body: &str) -> ExtractionResult {
        self.extract(&ParsedDocument::parse(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> ExtractionChain {
        ExtractionChain::new(&ExtractionConfig::default()).unwrap()
    }

    #[test]
    fn structured_payload_beats_marked_element() {
        let body = r#"<html><body>
            <script id="__NEXT_DATA__">{"props":{"pageProps":{"product":{"mrp":210}}}}</script>
            <span class="PriceBox">₹ 180</span>
            </body></html>"#;
        let result = chain().extract_html(body);
        assert_eq!(result.price, Some(210.0));
        assert_eq!(result.strategy, Some(StrategyKind::EmbeddedPayload));
    }

    #[test]
    fn no_signal_is_an_empty_result() {
        let result = chain().extract_html("<html><body><h1>Dolo 650</h1><p>Out of stock</p></body></html>");
        assert_eq!(result, ExtractionResult::empty());
        assert!(chain().extract_html("").is_empty());
        assert!(chain().extract_html("<<<>>> \u{0} garbage").is_empty());
    }

    #[test]
    fn percent_and_digit_bleed_are_excluded() {
        let result = chain().extract_html("<p>Save 20% more, MRP ₹149.02</p>");
        assert_eq!(result.raw_value.as_deref(), Some("149.02"));
        assert_eq!(result.price, Some(149.02));
        assert_eq!(result.strategy, Some(StrategyKind::KeywordScan));
    }

    #[test]
    fn unparseable_strategy_value_falls_through() {
        let body = r#"<script id="__NEXT_DATA__">{"props":{"pageProps":{"mrp":"N/A"}}}</script>
                      <p>Only ₹ 44</p>"#;
        let result = chain().extract_html(body);
        assert_eq!(result.price, Some(44.0));
        assert_eq!(result.strategy, Some(StrategyKind::CurrencyScan));
    }

    #[test]
    fn linked_data_used_when_payload_absent() {
        let body = r#"<script type="application/ld+json">{"offers":{"price":"1,020.75"}}</script>
                      <div class="price-tag">₹ 900</div>"#;
        let result = chain().extract_html(body);
        assert_eq!(result.price, Some(1020.75));
        assert_eq!(result.strategy, Some(StrategyKind::LinkedData));
    }

    #[test]
    fn custom_strategies_run_in_given_order() {
        struct Fixed(&'static str);
        impl PriceStrategy for Fixed {
            fn kind(&self) -> StrategyKind {
                StrategyKind::CurrencyScan
            }
            fn attempt(&self, _doc: &ParsedDocument) -> Option<String> {
                Some(self.0.to_string())
            }
        }
        let chain = ExtractionChain::with_strategies(vec![Box::new(Fixed("abc")), Box::new(Fixed("12"))]);
        assert_eq!(chain.extract_html("<p></p>").price, Some(12.0));
        assert_eq!(chain.strategies().count(), 2);
    }
}
