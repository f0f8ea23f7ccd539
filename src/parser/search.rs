use crate::config::SearchConfig;
use crate::model::{ConfigError, SearchCandidate};
use crate::utils::slug_to_name;
use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};
use std::collections::HashSet;

/// Pulls product links out of a catalog search results page.
pub struct SearchResultParser {
    base: Url,
    product_path: Regex,
    absolute: Regex,
    relative: Regex,
    anchors: Selector,
    max_candidates: usize,
}

impl SearchResultParser {
    pub fn new(cfg: &SearchConfig) -> Result<Self, ConfigError> {
        let base = Url::parse(&cfg.base_url)
            .map_err(|_| ConfigError::InvalidUrl(cfg.base_url.clone()))?;
        let pattern = &cfg.product_path_pattern;
        let base_prefix = regex::escape(cfg.base_url.trim_end_matches('/'));

        Ok(Self {
            product_path: build(format!(r"^{}/?$", pattern))?,
            absolute: build(format!(r"{}{}", base_prefix, pattern))?,
            relative: build(format!(r#"["']({})["']"#, pattern))?,
            anchors: Selector::parse("a[href]")
                .map_err(|_| ConfigError::InvalidSelector("a[href]".to_string()))?,
            base,
            max_candidates: cfg.max_candidates.max(1),
        })
    }

    /// Anchors first, then absolute URLs in the raw source, then quoted relative paths.
    pub fn parse(&self, body: &str) -> Vec<SearchCandidate> {
        let from_anchors = self.from_anchors(body);
        let candidates = if !from_anchors.is_empty() {
            from_anchors
        } else {
            let absolute: Vec<SearchCandidate> = self
                .absolute
                .find_iter(body)
                .map(|m| candidate(m.as_str().to_string(), None))
                .collect();
            if !absolute.is_empty() {
                absolute
            } else {
                self.relative
                    .captures_iter(body)
                    .filter_map(|c| c.get(1))
                    .filter_map(|m| self.base.join(m.as_str()).ok())
                    .map(|url| candidate(url.to_string(), None))
                    .collect()
            }
        };

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|c| seen.insert(c.url.clone()))
            .take(self.max_candidates)
            .collect()
    }

    fn from_anchors(&self, body: &str) -> Vec<SearchCandidate> {
        let html = Html::parse_document(body);
        html.select(&self.anchors)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                let mut url = self.base.join(href).ok()?;
                if !self.product_path.is_match(url.path()) {
                    return None;
                }
                url.set_query(None);
                url.set_fragment(None);
                let text = a.text().collect::<Vec<_>>().join(" ");
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                let url = url.as_str().trim_end_matches('/').to_string();
                Some(candidate(url, Some(text)))
            })
            .collect()
    }
}

fn build(pattern: String) -> Result<Regex, ConfigError> {
    Regex::new(&pattern).map_err(|source| ConfigError::InvalidPattern { pattern, source })
}

fn candidate(url: String, text: Option<String>) -> SearchCandidate {
    let name = match text {
        Some(t) if !t.is_empty() => t,
        _ => slug_to_name(&url),
    };
    SearchCandidate { name, url }
}
