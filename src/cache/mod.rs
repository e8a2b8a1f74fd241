//! On-disk page cache
//!
//! Every fetched page is written under a path derived from its URL, so a
//! URL is fetched over the network at most once per cache directory, across
//! pipeline stages and across runs.
//!
//! # Layout
//!
//! ```text
//! <root>/<aa>/<bb>/<remaining 60 hex chars>/
//!     source.url          URL that produced this key
//!     <label>.html        page content, one file per display label
//! ```

mod key;
mod store;

pub use key::{sanitize_label, CacheKey};
pub use store::{KeyGuard, PageCache};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the page cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cache key collision at {path}: entry belongs to {recorded}, requested {requested}")]
    Collision {
        path: PathBuf,
        recorded: String,
        requested: String,
    },
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
