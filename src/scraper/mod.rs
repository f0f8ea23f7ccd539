// Scraper module: document fetching and catalog search.

pub mod fetcher;
pub mod search;
pub mod traits;

pub use fetcher::HttpFetcher;
pub use search::HttpSearchResolver;
pub use traits::{DocumentFetcher, SearchResolver};
