// Orchestrator module: the sequential fetch-update and URL-population passes.

pub mod cancel;
pub mod populate;
pub mod retry;
pub mod updater;

pub use cancel::CancellationFlag;
pub use populate::UrlPopulator;
pub use retry::RetryPolicy;
pub use updater::PriceUpdater;
