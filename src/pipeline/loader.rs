use crate::cache::{CacheKey, PageCache};
use crate::fetch::{FetchError, SessionSlot};
use crate::pipeline::PipelineStats;
use crate::NestError;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Loads pages through the cache, fetching only on a miss
///
/// Lookups and fetches for one URL are serialized by the cache's per-key
/// lock, so however many tasks reference a URL it is fetched at most once
/// per cache directory.
#[derive(Clone)]
pub struct PageLoader {
    cache: PageCache,
    timeout: Option<Duration>,
    stats: Arc<PipelineStats>,
}

impl PageLoader {
    pub fn new(cache: PageCache, timeout: Option<Duration>, stats: Arc<PipelineStats>) -> Self {
        Self {
            cache,
            timeout,
            stats,
        }
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Returns the page content, or `None` if it degraded to "not found"
    ///
    /// # Errors
    ///
    /// Cache I/O failures and non-transient fetch failures are fatal.
    pub async fn load(
        &self,
        session: &mut SessionSlot,
        url: &Url,
        label: &str,
    ) -> Result<Option<String>, NestError> {
        let _guard = self.cache.lock(&CacheKey::for_url(url)).await;

        if let Some(content) = self.cache.lookup(url, label).await? {
            tracing::debug!("Cache hit for {}", url);
            self.stats.record_cache_hit();
            return Ok(Some(content));
        }

        let session = session.get().await?;
        let fetched = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, session.fetch(url)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout {
                    url: url.to_string(),
                }),
            },
            None => session.fetch(url).await,
        };

        match fetched {
            Ok(content) => {
                self.stats.record_fetch();
                self.cache.store(url, label, &content).await?;
                tracing::debug!("Fetched and cached {}", url);
                Ok(Some(content))
            }
            Err(e) if e.is_transient() => {
                self.stats.record_transient_failure();
                tracing::warn!("{}; treating page as not found", e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchResult, FetchSession, Fetcher};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct ScriptedFetcher {
        pages: HashMap<String, String>,
        delay: Option<Duration>,
        calls: Arc<AtomicUsize>,
    }

    struct ScriptedSession {
        pages: HashMap<String, String>,
        delay: Option<Duration>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn open_session(&self) -> FetchResult<Box<dyn FetchSession>> {
            Ok(Box::new(ScriptedSession {
                pages: self.pages.clone(),
                delay: self.delay,
                calls: Arc::clone(&self.calls),
            }))
        }
    }

    #[async_trait]
    impl FetchSession for ScriptedSession {
        async fn fetch(&mut self, url: &Url) -> FetchResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.pages.get(url.as_str()) {
                Some(page) => Ok(page.clone()),
                None if url.path() == "/boom" => Err(FetchError::Network {
                    url: url.to_string(),
                    message: "reset by peer".to_string(),
                }),
                None => Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }

        async fn close(&mut self) {}
    }

    fn setup(fetcher: ScriptedFetcher, timeout: Option<Duration>) -> (TempDir, PageLoader, Arc<ScriptedFetcher>) {
        let dir = TempDir::new().unwrap();
        let cache = PageCache::open(dir.path()).unwrap();
        let loader = PageLoader::new(cache, timeout, Arc::new(PipelineStats::default()));
        (dir, loader, Arc::new(fetcher))
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_second_load_hits_cache() {
        let mut pages = HashMap::new();
        pages.insert("https://example.com/ca".to_string(), "<html>ca</html>".to_string());
        let (_dir, loader, fetcher) = setup(
            ScriptedFetcher {
                pages,
                ..Default::default()
            },
            None,
        );
        let mut session = SessionSlot::new(fetcher.clone());

        let first = loader.load(&mut session, &url("https://example.com/ca"), "California").await;
        let second = loader.load(&mut session, &url("https://example.com/ca"), "CA").await;
        session.release().await;

        assert_eq!(first.unwrap().as_deref(), Some("<html>ca</html>"));
        assert_eq!(second.unwrap().as_deref(), Some("<html>ca</html>"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let stats = loader.stats.snapshot();
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.cache_hits, 1);
    }

    #[tokio::test]
    async fn test_empty_page_is_fetched_once() {
        let mut pages = HashMap::new();
        pages.insert("https://example.com/blank".to_string(), String::new());
        let (_dir, loader, fetcher) = setup(
            ScriptedFetcher {
                pages,
                ..Default::default()
            },
            None,
        );
        let mut session = SessionSlot::new(fetcher.clone());

        let first = loader.load(&mut session, &url("https://example.com/blank"), "Blank").await;
        let second = loader.load(&mut session, &url("https://example.com/blank"), "Blank").await;
        session.release().await;

        assert_eq!(first.unwrap().as_deref(), Some(""));
        assert_eq!(second.unwrap().as_deref(), Some(""));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(loader.stats.snapshot().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_missing_page_is_transient() {
        let (_dir, loader, fetcher) = setup(ScriptedFetcher::default(), None);
        let mut session = SessionSlot::new(fetcher);

        let page = loader.load(&mut session, &url("https://example.com/gone"), "gone").await;
        session.release().await;

        assert_eq!(page.unwrap(), None);
        assert_eq!(loader.stats.snapshot().transient_failures, 1);
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_none() {
        let mut pages = HashMap::new();
        pages.insert("https://example.com/slow".to_string(), "<html/>".to_string());
        let (_dir, loader, fetcher) = setup(
            ScriptedFetcher {
                pages,
                delay: Some(Duration::from_millis(500)),
                ..Default::default()
            },
            Some(Duration::from_millis(20)),
        );
        let mut session = SessionSlot::new(fetcher);

        let page = loader.load(&mut session, &url("https://example.com/slow"), "slow").await;
        session.release().await;

        assert_eq!(page.unwrap(), None);
        // Nothing was cached for the timed-out page
        assert!(!PageCache::exists(&loader.cache().resolve(&url("https://example.com/slow"), "slow")).await);
    }

    #[tokio::test]
    async fn test_network_error_is_fatal() {
        let (_dir, loader, fetcher) = setup(ScriptedFetcher::default(), None);
        let mut session = SessionSlot::new(fetcher);

        let page = loader.load(&mut session, &url("https://example.com/boom"), "boom").await;
        session.release().await;

        assert!(matches!(page, Err(NestError::Fetch(FetchError::Network { .. }))));
    }
}
