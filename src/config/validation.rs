use crate::config::types::{Config, CrawlerConfig, FetchConfig, OutputConfig, SelectorConfig};
use crate::pipeline::{QueuePolicy, StopPolicy};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Largest pool size accepted for a single stage
const MAX_WORKERS: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_selectors(&config.selectors)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates pipeline shape
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.index_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid index-url: {}", e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "index-url must use http or https, got '{}'",
            config.index_url
        )));
    }

    for (stage, workers) in [
        ("region-workers", config.region_workers),
        ("area-workers", config.area_workers),
        ("leaf-workers", config.leaf_workers),
    ] {
        if workers < 1 || workers > MAX_WORKERS {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and {}, got {}",
                stage, MAX_WORKERS, workers
            )));
        }
    }

    match config.queue {
        QueuePolicy::Block { capacity } | QueuePolicy::DropNewest { capacity }
            if capacity < 1 =>
        {
            return Err(ConfigError::Validation(
                "queue capacity must be >= 1".to_string(),
            ));
        }
        _ => {}
    }

    match config.stop {
        StopPolicy::Count { limit } if limit < 1 => {
            return Err(ConfigError::Validation(
                "stop limit must be >= 1".to_string(),
            ));
        }
        StopPolicy::Elapsed { seconds } if seconds < 1 => {
            return Err(ConfigError::Validation(
                "stop seconds must be >= 1".to_string(),
            ));
        }
        _ => {}
    }

    Ok(())
}

/// Validates fetcher settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if let Some(timeout) = config.timeout_ms {
        if timeout < 100 {
            return Err(ConfigError::Validation(format!(
                "timeout-ms must be >= 100ms, got {}ms",
                timeout
            )));
        }
    }

    if config.connect_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "connect-timeout-ms must be >= 100ms, got {}ms",
            config.connect_timeout_ms
        )));
    }

    Ok(())
}

/// Checks every locator expression compiles
fn validate_selectors(config: &SelectorConfig) -> Result<(), ConfigError> {
    for selector in [
        &config.region_links,
        &config.area_links,
        &config.section_heading,
        &config.section_block,
        &config.section_links,
        &config.detail_label,
    ] {
        Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
            selector: selector.clone(),
            message: format!("{:?}", e),
        })?;
    }

    for (name, text) in [
        ("section-heading-text", &config.section_heading_text),
        ("residents-label", &config.residents_label),
        ("homeowners-label", &config.homeowners_label),
    ] {
        if text.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} cannot be empty",
                name
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
