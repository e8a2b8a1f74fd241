//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler:
//! - Building HTTP clients with the configured user agent and timeouts
//! - GET requests to fetch page content
//! - Error classification into transient and fatal failures

use crate::config::FetchConfig;
use crate::fetch::{FetchError, FetchResult, FetchSession, Fetcher};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Maximum number of redirects followed per request
const MAX_REDIRECTS: usize = 10;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use nestcrawl::config::FetchConfig;
/// use nestcrawl::fetch::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true);

    if let Some(timeout) = config.timeout_ms {
        builder = builder.timeout(Duration::from_millis(timeout));
    }

    builder.build()
}

/// Fetcher that opens one `reqwest` client per session
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn open_session(&self) -> FetchResult<Box<dyn FetchSession>> {
        let client =
            build_http_client(&self.config).map_err(|e| FetchError::Session(e.to_string()))?;
        tracing::debug!("Opened HTTP session");
        Ok(Box::new(HttpSession { client }))
    }
}

/// A single HTTP client used by one worker
#[derive(Debug)]
pub struct HttpSession {
    client: Client,
}

#[async_trait]
impl FetchSession for HttpSession {
    async fn fetch(&mut self, url: &Url) -> FetchResult<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| classify(url, e))
    }

    async fn close(&mut self) {
        tracing::debug!("Closed HTTP session");
    }
}

/// Maps a `reqwest` error onto the fetch error taxonomy
fn classify(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
