use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Listing source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Site root (e.g., "https://eztvx.to")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the full show listing
    #[serde(default = "default_listing_path")]
    pub listing_path: String,
    /// Shared request budget for every fetch against the site
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Torrents requested per payload call
    #[serde(default = "default_payload_page_size")]
    pub payload_page_size: u32,
}

impl SourceConfig {
    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Absolute listing URL; the path always gets a leading and trailing slash.
    pub fn listing_url(&self) -> String {
        let path = self.listing_path.trim_matches('/');
        if path.is_empty() {
            format!("{}/", self.base())
        } else {
            format!("{}/{}/", self.base(), path)
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            listing_path: default_listing_path(),
            requests_per_second: default_requests_per_second(),
            timeout_secs: default_timeout(),
            payload_page_size: default_payload_page_size(),
        }
    }
}

fn default_base_url() -> String {
    "https://eztvx.to".to_string()
}

fn default_listing_path() -> String {
    "/showlist/".to_string()
}

fn default_requests_per_second() -> u32 {
    3
}

fn default_timeout() -> u32 {
    30
}

fn default_payload_page_size() -> u32 {
    100
}

/// Batching, caching and checkpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Age after which the listing is crawled again
    #[serde(default = "default_cache_max_age_hours")]
    pub cache_max_age_hours: u32,
    /// Limit processing volume and write to the debug table
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default = "default_debug_processing_limit")]
    pub debug_processing_limit: usize,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_cache_file")]
    pub cache_file: String,
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,
}

impl PipelineConfig {
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(&self.cache_file)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join(&self.checkpoint_file)
    }

    pub fn cache_max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.cache_max_age_hours))
    }

    /// Item cap in effect, if any.
    pub fn processing_limit(&self) -> Option<usize> {
        self.debug_mode.then_some(self.debug_processing_limit)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            cache_max_age_hours: default_cache_max_age_hours(),
            debug_mode: false,
            debug_processing_limit: default_debug_processing_limit(),
            data_dir: default_data_dir(),
            cache_file: default_cache_file(),
            checkpoint_file: default_checkpoint_file(),
        }
    }
}

fn default_batch_size() -> usize {
    25
}

fn default_cache_max_age_hours() -> u32 {
    4
}

fn default_debug_processing_limit() -> usize {
    120
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_cache_file() -> String {
    "eztv.json".to_string()
}

fn default_checkpoint_file() -> String {
    "completed.json".to_string()
}

/// Ingestion store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Destination table
    #[serde(default = "default_table")]
    pub table: String,
    /// Tag written to the `source` column and used in the dedup key
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
}

impl StoreConfig {
    /// Table that actually receives rows (debug runs get their own).
    pub fn effective_table(&self, debug_mode: bool) -> String {
        if debug_mode {
            format!("{}_debug", self.table)
        } else {
            self.table.clone()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            table: default_table(),
            source_tag: default_source_tag(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("showcrawl.db")
}

fn default_table() -> String {
    "ingested_torrents".to_string()
}

fn default_source_tag() -> String {
    "EZTV".to_string()
}

/// Durable queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_path")]
    pub path: PathBuf,
    #[serde(default = "default_queue_name")]
    pub name: String,
    /// How often an idle consumer checks for new messages
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Claimed but unacknowledged messages are redelivered after this long
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: default_queue_path(),
            name: default_queue_name(),
            poll_interval_ms: default_poll_interval(),
            visibility_timeout_secs: default_visibility_timeout(),
        }
    }
}

fn default_queue_path() -> PathBuf {
    PathBuf::from("showcrawl-queue.db")
}

fn default_queue_name() -> String {
    "eztv_batches".to_string()
}

fn default_poll_interval() -> u64 {
    500
}

fn default_visibility_timeout() -> u64 {
    300
}
