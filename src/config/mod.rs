//! Configuration module for nestcrawl
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. A configuration is an explicit value handed to the pipeline; nothing
//! reads it as ambient global state.
//!
//! # Example
//!
//! ```no_run
//! use nestcrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("nestcrawl.toml")).unwrap();
//! println!("Output goes to: {}", config.output.path.display());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CacheConfig, Config, CrawlerConfig, FetchConfig, OutputConfig, SelectorConfig,
    DEFAULT_INDEX_URL,
};

// Re-export parser functions
pub use parser::{load_config, parse_config, resolve_cache_root};
pub use validation::validate;
