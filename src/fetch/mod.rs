//! Page fetching
//!
//! A [`Fetcher`] hands out [`FetchSession`]s; each pipeline worker owns one
//! session for its whole life and closes it when it stops. The crate ships an
//! HTTP implementation ([`HttpFetcher`]); tests and embedders can supply
//! their own, e.g. one backed by a headless browser.

mod http;
mod session;

pub use http::{build_http_client, HttpFetcher, HttpSession};
pub use session::SessionSlot;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Errors raised while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timed out loading {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Failed to open fetch session: {0}")]
    Session(String),
}

impl FetchError {
    /// Whether the page should degrade to "not found" instead of failing the run
    ///
    /// Timeouts and pages that are gone (404, 410) are transient; everything
    /// else is fatal.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => matches!(status, 404 | 410),
            FetchError::Network { .. } | FetchError::Session(_) => false,
        }
    }
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

/// Source of fetch sessions
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Opens a new, independent session
    async fn open_session(&self) -> FetchResult<Box<dyn FetchSession>>;
}

/// One live fetching context (a browser context, an HTTP client, ...)
///
/// Sessions are never shared between workers.
#[async_trait]
pub trait FetchSession: Send {
    /// Loads `url` and returns the fully loaded page markup
    async fn fetch(&mut self, url: &Url) -> FetchResult<String>;

    /// Releases the session's resources
    async fn close(&mut self);
}
