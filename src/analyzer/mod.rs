// Analyzer module: name matching and batch outcome summaries.

pub mod matcher;
pub mod summary;

// Re-export the main types for ease of use.
pub use matcher::MatchClassifier;
pub use summary::{BatchReport, PopulateReport};
