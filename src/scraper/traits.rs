use crate::model::{FetchError, FetchedDocument, SearchCandidate};

/// Fetches one document by source reference.
#[async_trait::async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError>;

    /// Releases the underlying session. Called once when a batch ends.
    async fn close(&self) {}
}

/// Looks a canonical name up in the catalog search.
#[async_trait::async_trait]
pub trait SearchResolver: Send + Sync {
    async fn search(&self, name: &str) -> Result<Vec<SearchCandidate>, FetchError>;

    async fn close(&self) {}
}
