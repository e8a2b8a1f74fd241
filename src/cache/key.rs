use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Deterministic identifier of a cached URL
///
/// The key is the hex-encoded SHA-256 of the URL text. It is laid out on disk
/// as `aa/bb/<remaining 60 characters>` so no single directory grows too large.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for a URL
    ///
    /// # Example
    ///
    /// ```
    /// use nestcrawl::CacheKey;
    /// use url::Url;
    ///
    /// let url = Url::parse("https://example.com/ca").unwrap();
    /// assert_eq!(CacheKey::for_url(&url), CacheKey::for_url(&url));
    /// assert_eq!(CacheKey::for_url(&url).as_str().len(), 64);
    /// ```
    pub fn for_url(url: &Url) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_str().as_bytes());
        CacheKey(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Relative directory holding every file for this key
    pub fn shard_path(&self) -> PathBuf {
        let (first, rest) = self.0.split_at(2);
        let (second, rest) = rest.split_at(2);
        [first, second, rest].iter().collect()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns a display label into a file stem
///
/// Spaces become `_` and `/` becomes `--`; any other character that is unsafe
/// in a file name becomes `_`.
pub fn sanitize_label(label: &str) -> String {
    let label = label.trim();
    if label.is_empty() {
        return "index".to_string();
    }

    let mut stem = String::with_capacity(label.len());
    for c in label.chars() {
        match c {
            '/' => stem.push_str("--"),
            c if c.is_whitespace() => stem.push('_'),
            '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => stem.push('_'),
            c if c.is_control() => stem.push('_'),
            c => stem.push(c),
        }
    }

    // Leading dots would hide the file or escape the directory
    if stem.starts_with('.') {
        stem.insert(0, '_');
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = CacheKey::for_url(&url("https://example.com/ca/oakland"));
        let b = CacheKey::for_url(&url("https://example.com/ca/oakland"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_urls_different_keys() {
        let a = CacheKey::for_url(&url("https://example.com/ca"));
        let b = CacheKey::for_url(&url("https://example.com/ny"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_is_full_sha256() {
        let key = CacheKey::for_url(&url("https://example.com/"));
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_shard_path_layout() {
        let key = CacheKey::for_url(&url("https://example.com/"));
        let shard = key.shard_path();
        let parts: Vec<_> = shard.iter().map(|p| p.to_string_lossy().to_string()).collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 2);
        assert_eq!(parts[1].len(), 2);
        assert_eq!(parts[2].len(), 60);
        assert_eq!(parts.concat(), key.as_str());
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("San Francisco"), "San_Francisco");
        assert_eq!(sanitize_label("North/South"), "North--South");
        assert_eq!(sanitize_label("a:b"), "a_b");
        assert_eq!(sanitize_label("  "), "index");
        assert_eq!(sanitize_label(".."), "_..");
        assert_eq!(Path::new(&sanitize_label("../etc")).components().count(), 1);
    }
}
