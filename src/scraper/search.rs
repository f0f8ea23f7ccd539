use crate::config::{FetchConfig, SearchConfig};
use crate::model::{ConfigError, FetchError, SearchCandidate};
use crate::parser::SearchResultParser;
use crate::scraper::{HttpFetcher, SearchResolver};
use reqwest::Url;
use tracing::debug;

/// Catalog search over HTTP: fetch the results page, parse product links.
pub struct HttpSearchResolver {
    fetcher: HttpFetcher,
    parser: SearchResultParser,
    template: Url,
}

impl HttpSearchResolver {
    pub fn new(search: &SearchConfig, fetch: &FetchConfig) -> Result<Self, ConfigError> {
        let template = Url::parse(&search.search_url)
            .map_err(|_| ConfigError::InvalidUrl(search.search_url.clone()))?;
        let fetcher = HttpFetcher::new(fetch).map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            fetcher,
            parser: SearchResultParser::new(search)?,
            template,
        })
    }

    /// Substitutes the `{query}` placeholder with the form-encoded name.
    pub fn search_url(&self, name: &str) -> Url {
        let mut url = self.template.clone();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                let v = if v == "{query}" { name.to_string() } else { v.into_owned() };
                (k.into_owned(), v)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs.iter());
        url
    }
}

#[async_trait::async_trait]
impl SearchResolver for HttpSearchResolver {
    async fn search(&self, name: &str) -> Result<Vec<SearchCandidate>, FetchError> {
        let url = self.search_url(name);
        let body = self.fetcher.get_text(url.as_str()).await?;
        let candidates = self.parser.parse(&body);
        debug!("{} candidates for '{}'", candidates.len(), name);
        Ok(candidates)
    }
}
