use crate::cache::key::{sanitize_label, CacheKey};
use crate::cache::{CacheError, CacheResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::fs;
use tokio::sync::OwnedMutexGuard;
use url::Url;

/// File recording which URL produced a key directory
const SOURCE_FILE: &str = "source.url";

/// Extension of cached page files
const PAGE_EXTENSION: &str = "html";

/// Content-addressed on-disk page cache
///
/// Entries are permanent for the life of the cache root. Cloning is cheap
/// and every clone shares the same per-key locks.
#[derive(Debug, Clone)]
pub struct PageCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    root: PathBuf,
    locks: Mutex<HashMap<CacheKey, KeyLock>>,
}

type KeyLock = Arc<tokio::sync::Mutex<()>>;

impl CacheInner {
    fn locks(&self) -> MutexGuard<'_, HashMap<CacheKey, KeyLock>> {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Exclusive hold on one cache key, released on drop
///
/// Dropping the last hold on a key also forgets its lock, so the lock table
/// only ever holds keys that are in flight.
#[derive(Debug)]
pub struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    cache: Arc<CacheInner>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Holders and waiters each own a clone; the table's copy is the last
        self.cache
            .locks()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

impl PageCache {
    /// Opens a cache rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| CacheError::Io {
            path: root.clone(),
            source,
        })?;

        Ok(Self {
            inner: Arc::new(CacheInner {
                root,
                locks: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Root directory of the cache
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Maps a URL and display label to the file its content lives in
    ///
    /// Pure: the same inputs always give the same path. The label only shapes
    /// the file name; the URL alone decides the directory.
    pub fn resolve(&self, url: &Url, label: &str) -> PathBuf {
        self.key_dir(&CacheKey::for_url(url))
            .join(format!("{}.{}", sanitize_label(label), PAGE_EXTENSION))
    }

    /// Whether `path` already holds content
    ///
    /// Pages are only ever written by rename, so any file present is a
    /// complete page, empty ones included.
    pub async fn exists(path: &Path) -> bool {
        matches!(fs::metadata(path).await, Ok(meta) if meta.is_file())
    }

    /// Reads a cached page
    pub async fn read(path: &Path) -> CacheResult<String> {
        fs::read_to_string(path)
            .await
            .map_err(|source| CacheError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Writes page content for a URL, creating parent directories as needed
    ///
    /// The write goes through a temporary file and a rename, so a reader never
    /// observes a partially written page.
    pub async fn store(&self, url: &Url, label: &str, content: &str) -> CacheResult<PathBuf> {
        let path = self.resolve(url, label);
        let dir = self.key_dir(&CacheKey::for_url(url));

        fs::create_dir_all(&dir)
            .await
            .map_err(|source| CacheError::Io {
                path: dir.clone(),
                source,
            })?;

        write_atomic(&dir.join(SOURCE_FILE), url.as_str()).await?;
        write_atomic(&path, content).await?;

        tracing::trace!("Cached {} at {}", url, path.display());
        Ok(path)
    }

    /// Looks up cached content for a URL
    ///
    /// Returns the content stored under `label` if present. Otherwise, if the
    /// same URL was cached under a different label, that content is reused and
    /// copied to this label's path. A key directory recorded for a different
    /// URL counts as a miss.
    pub async fn lookup(&self, url: &Url, label: &str) -> CacheResult<Option<String>> {
        let key = CacheKey::for_url(url);
        let dir = self.key_dir(&key);

        if !self.owns(&dir, url).await? {
            return Ok(None);
        }

        let path = self.resolve(url, label);
        if Self::exists(&path).await {
            return Self::read(&path).await.map(Some);
        }

        if let Some(sibling) = find_page(&dir).await? {
            let content = Self::read(&sibling).await?;
            tracing::debug!(
                "Reusing {} for {} under label '{}'",
                sibling.display(),
                url,
                label
            );
            write_atomic(&path, &content).await?;
            return Ok(Some(content));
        }

        Ok(None)
    }

    /// Acquires the single-flight lock for a key
    ///
    /// Holders of the guard are the only task looking up or fetching that URL.
    pub async fn lock(&self, key: &CacheKey) -> KeyGuard {
        let lock = Arc::clone(self.inner.locks().entry(key.clone()).or_default());
        KeyGuard {
            guard: Some(lock.lock_owned().await),
            cache: Arc::clone(&self.inner),
        }
    }

    fn key_dir(&self, key: &CacheKey) -> PathBuf {
        self.inner.root.join(key.shard_path())
    }

    /// Checks the key directory was produced by `url`
    async fn owns(&self, dir: &Path, url: &Url) -> CacheResult<bool> {
        let source_path = dir.join(SOURCE_FILE);
        match fs::read_to_string(&source_path).await {
            Ok(recorded) if recorded.trim() == url.as_str() => Ok(true),
            Ok(recorded) => {
                let err = CacheError::Collision {
                    path: dir.to_path_buf(),
                    recorded: recorded.trim().to_string(),
                    requested: url.to_string(),
                };
                tracing::warn!("{}; treating as a miss", err);
                Ok(false)
            }
            // Entries written before source tracking, or not yet written at all
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(source) => Err(CacheError::Io {
                path: source_path,
                source,
            }),
        }
    }
}

/// Finds any cached page file in a key directory
async fn find_page(dir: &Path) -> CacheResult<Option<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CacheError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    while let Some(entry) = entries.next_entry().await.map_err(|source| CacheError::Io {
        path: dir.to_path_buf(),
        source,
    })? {
        let path = entry.path();
        let is_page = path
            .extension()
            .map(|ext| ext == PAGE_EXTENSION)
            .unwrap_or(false);
        if is_page && PageCache::exists(&path).await {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

async fn write_atomic(path: &Path, content: &str) -> CacheResult<()> {
    let tmp = path.with_extension(format!("tmp-{}", std::process::id()));
    fs::write(&tmp, content)
        .await
        .map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
    fs::rename(&tmp, path)
        .await
        .map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })
}
