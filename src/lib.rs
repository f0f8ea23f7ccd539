pub mod analyzer;
pub mod config;
pub mod model;
pub mod normalizer;
pub mod orchestrator;
pub mod parser;
pub mod scraper;
pub mod storage;
pub mod utils;
