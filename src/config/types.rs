use crate::pipeline::{QueuePolicy, StopPolicy};
use serde::Deserialize;
use std::path::PathBuf;

/// Default index page listing every region
pub const DEFAULT_INDEX_URL: &str = "https://nextdoor.com/find-neighborhood/";

/// Main configuration structure for nestcrawl
///
/// Every section is optional in the TOML file; missing values fall back to
/// the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetch: FetchConfig,
    pub selectors: SelectorConfig,
    pub cache: CacheConfig,
    pub output: OutputConfig,
}

/// Pipeline shape: seed page, pool sizes, queues and stopping
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Top-level index page the Region queue is seeded from
    #[serde(rename = "index-url")]
    pub index_url: String,

    /// Number of workers draining the Region queue
    #[serde(rename = "region-workers")]
    pub region_workers: usize,

    /// Number of workers draining the Area queue
    #[serde(rename = "area-workers")]
    pub area_workers: usize,

    /// Number of workers draining the Leaf queue
    #[serde(rename = "leaf-workers")]
    pub leaf_workers: usize,

    /// Capacity and backpressure behavior shared by all three queues
    pub queue: QueuePolicy,

    /// When the run stops producing records
    pub stop: StopPolicy,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            region_workers: 4,
            area_workers: 4,
            leaf_workers: 4,
            queue: QueuePolicy::default(),
            stop: StopPolicy::default(),
        }
    }
}

impl CrawlerConfig {
    /// Sets the same pool size on every stage
    pub fn set_all_workers(&mut self, workers: usize) {
        self.region_workers = workers;
        self.area_workers = workers;
        self.leaf_workers = workers;
    }
}

/// HTTP fetcher settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Page load timeout in milliseconds; `None` waits indefinitely
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    #[serde(rename = "connect-timeout-ms")]
    pub connect_timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("nestcrawl/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: Some(30_000),
            connect_timeout_ms: 10_000,
        }
    }
}

/// Locator expressions for every stage
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Region links on the index page
    #[serde(rename = "region-links")]
    pub region_links: String,

    /// Area links on a region page
    #[serde(rename = "area-links")]
    pub area_links: String,

    /// Heading that introduces the leaf list on an area page
    #[serde(rename = "section-heading")]
    pub section_heading: String,

    #[serde(rename = "section-heading-text")]
    pub section_heading_text: String,

    /// Block element wrapping the heading; only sibling blocks of the same
    /// kind are searched for links
    #[serde(rename = "section-block")]
    pub section_block: String,

    /// Links inside the blocks following the section heading
    #[serde(rename = "section-links")]
    pub section_links: String,

    /// Label elements on a leaf page; the value is the preceding sibling
    #[serde(rename = "detail-label")]
    pub detail_label: String,

    #[serde(rename = "residents-label")]
    pub residents_label: String,

    #[serde(rename = "homeowners-label")]
    pub homeowners_label: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            region_links: "a.link".to_string(),
            area_links: "a.link".to_string(),
            section_heading: "h2".to_string(),
            section_heading_text: "Nearby neighborhoods".to_string(),
            section_block: "div".to_string(),
            section_links: "a".to_string(),
            detail_label: "span".to_string(),
            residents_label: "Residents".to_string(),
            homeowners_label: "Homeowners".to_string(),
        }
    }
}

/// On-disk page cache location
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Overrides the platform cache directory
    pub root: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the CSV file written at the end of the run
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data.csv"),
        }
    }
}
