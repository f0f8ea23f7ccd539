use crate::config::FetchConfig;
use crate::model::{FetchError, FetchedDocument};
use crate::scraper::DocumentFetcher;
use crate::utils::normalize_url;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use tracing::debug;

/// Plain HTTP fetcher; one client (and connection pool) per batch.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(cfg: &FetchConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        if let Ok(lang) = HeaderValue::from_str(&cfg.accept_language) {
            headers.insert(header::ACCEPT_LANGUAGE, lang);
        }

        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .default_headers(headers)
            .timeout(cfg.request_timeout())
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self { client })
    }

    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if let Some(err) = classify_status(status) {
            return Err(err);
        }

        response.text().await.map_err(map_reqwest_error)
    }
}

fn classify_status(status: StatusCode) -> Option<FetchError> {
    match status {
        s if s.is_success() => None,
        StatusCode::TOO_MANY_REQUESTS => Some(FetchError::RateLimited),
        StatusCode::NOT_FOUND | StatusCode::GONE => Some(FetchError::NotFound),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Some(FetchError::Timeout),
        s => Some(FetchError::Network(format!("HTTP {}", s))),
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e.to_string())
    }
}

#[async_trait::async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        let url = normalize_url(url);
        let body = self.get_text(&url).await?;
        Ok(FetchedDocument { url, body })
    }
}
