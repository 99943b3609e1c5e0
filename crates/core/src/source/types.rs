//! Types for the listing source.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::record::ExternalId;

/// Errors from a source fetch.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// One row of the source's listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub key: String,
    pub title: String,
    pub status: String,
    /// Raw kind string; validated when the entry becomes a record.
    pub kind: String,
}

/// Torrents the payload API returns for one external identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentPage {
    /// Absent in the API response when nothing is known for the identifier.
    #[serde(default)]
    pub torrents: Vec<TorrentEntry>,
}

/// A single torrent within a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentEntry {
    pub title: String,
    /// Info hash as reported by the source (any case).
    pub hash: String,
    #[serde(deserialize_with = "u64_from_string_or_number")]
    pub size_bytes: u64,
    #[serde(default, deserialize_with = "u32_from_string_or_number")]
    pub seeds: u32,
    #[serde(default, deserialize_with = "u32_from_string_or_number")]
    pub peers: u32,
}

/// Source of listings, detail pages and payloads.
///
/// Implementations do not rate-limit themselves; callers share a
/// [`RateLimiter`](super::RateLimiter) across fetches.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Fetch the full listing.
    async fn fetch_listing(&self) -> Result<Vec<ListingEntry>, SourceError>;

    /// Fetch the raw detail page for a record key.
    async fn fetch_detail(&self, key: &str) -> Result<String, SourceError>;

    /// Fetch the torrents known for an external identifier.
    async fn fetch_payload(&self, external_id: &ExternalId) -> Result<TorrentPage, SourceError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Number(u64),
    Text(String),
}

impl StringOrNumber {
    fn into_u64<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            StringOrNumber::Number(n) => Ok(n),
            StringOrNumber::Text(s) => s.trim().parse().map_err(E::custom),
        }
    }
}

fn u64_from_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    StringOrNumber::deserialize(deserializer)?.into_u64()
}

fn u32_from_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = StringOrNumber::deserialize(deserializer)?.into_u64::<D::Error>()?;
    u32::try_from(value).map_err(serde::de::Error::custom)
}
