use crate::config::types::{CacheConfig, Config};
use crate::config::validation::validate;
use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use nestcrawl::config::load_config;
///
/// let config = load_config(Path::new("nestcrawl.toml")).unwrap();
/// println!("Leaf workers: {}", config.crawler.leaf_workers);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
///
/// Missing sections and fields take their defaults, so an empty string is a
/// valid configuration.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Resolves the directory the page cache lives in
///
/// The `[cache] root` override wins; otherwise the platform's per-user cache
/// directory for this application is used.
pub fn resolve_cache_root(config: &CacheConfig) -> Result<PathBuf, ConfigError> {
    if let Some(root) = &config.root {
        return Ok(root.clone());
    }

    ProjectDirs::from("", "", "nestcrawl")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .ok_or(ConfigError::NoCacheDir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{QueuePolicy, StopPolicy};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
index-url = "https://directory.example.com/"
region-workers = 2
area-workers = 3
leaf-workers = 5

[crawler.queue]
mode = "drop-newest"
capacity = 64

[crawler.stop]
kind = "count"
limit = 10

[fetch]
user-agent = "TestCrawler/1.0"
timeout-ms = 5000

[cache]
root = "/tmp/nestcrawl-test-cache"

[output]
path = "./neighborhoods.csv"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.index_url, "https://directory.example.com/");
        assert_eq!(config.crawler.region_workers, 2);
        assert_eq!(config.crawler.area_workers, 3);
        assert_eq!(config.crawler.leaf_workers, 5);
        assert_eq!(config.crawler.queue, QueuePolicy::DropNewest { capacity: 64 });
        assert_eq!(config.crawler.stop, StopPolicy::Count { limit: 10 });
        assert_eq!(config.fetch.user_agent, "TestCrawler/1.0");
        assert_eq!(config.fetch.timeout_ms, Some(5000));
        assert_eq!(
            config.cache.root,
            Some(PathBuf::from("/tmp/nestcrawl-test-cache"))
        );
        assert_eq!(config.output.path, PathBuf::from("./neighborhoods.csv"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();

        assert_eq!(config.crawler.region_workers, 4);
        assert_eq!(config.crawler.area_workers, 4);
        assert_eq!(config.crawler.leaf_workers, 4);
        assert_eq!(config.crawler.stop, StopPolicy::Count { limit: 101 });
        assert_eq!(config.selectors.region_links, "a.link");
        assert_eq!(config.selectors.section_heading_text, "Nearby neighborhoods");
        assert_eq!(config.selectors.section_block, "div");
        assert_eq!(config.output.path, PathBuf::from("data.csv"));
        assert!(config.cache.root.is_none());
    }

    #[test]
    fn test_stop_policy_variants() {
        let config = parse_config("[crawler.stop]\nkind = \"exhausted\"\n").unwrap();
        assert_eq!(config.crawler.stop, StopPolicy::Exhausted);

        let config = parse_config("[crawler.stop]\nkind = \"elapsed\"\nseconds = 90\n").unwrap();
        assert_eq!(config.crawler.stop, StopPolicy::Elapsed { seconds: 90 });
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/nestcrawl.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config("[crawler]\nleaf-workers = 0\n");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_cache_root_override() {
        let config = CacheConfig {
            root: Some(PathBuf::from("/srv/cache")),
        };
        assert_eq!(
            resolve_cache_root(&config).unwrap(),
            PathBuf::from("/srv/cache")
        );
    }
}
