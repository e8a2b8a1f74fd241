//! nestcrawl: a three-level directory crawler
//!
//! This crate crawls a hierarchical directory of pages (regions, then areas,
//! then leaf items), caching every fetched page on disk, and flattens each
//! leaf item into one CSV record.

pub mod cache;
pub mod config;
pub mod document;
pub mod fetch;
pub mod output;
pub mod pipeline;

use thiserror::Error;

/// Main error type for nestcrawl operations
#[derive(Debug, Error)]
pub enum NestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("Document error: {0}")]
    Document(#[from] document::DocumentError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("{stage} worker {worker} panicked: {message}")]
    WorkerPanicked {
        stage: pipeline::StageKind,
        worker: usize,
        message: String,
    },

    #[error("Worker task failed: {0}")]
    WorkerJoin(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Could not determine a cache directory for this platform; set [cache] root")]
    NoCacheDir,
}

/// Result type alias for nestcrawl operations
pub type Result<T> = std::result::Result<T, NestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use cache::{CacheKey, PageCache};
pub use config::Config;
pub use fetch::{FetchSession, Fetcher, HttpFetcher};
pub use output::{LeafRecord, RunSummary, Sink};
pub use pipeline::{Pipeline, QueuePolicy, StopPolicy};
