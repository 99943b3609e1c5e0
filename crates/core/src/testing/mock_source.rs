//! Mock listing source for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::record::ExternalId;
use crate::source::{ListingEntry, SourceAdapter, SourceError, TorrentPage};

/// Mock implementation of the SourceAdapter trait.
///
/// Provides controllable behavior for testing:
/// - Configurable listing, detail pages and payloads
/// - Per-key and per-identifier failures
/// - Recorded calls for assertions
#[derive(Debug, Default)]
pub struct MockSource {
    listing: Arc<RwLock<Option<Vec<ListingEntry>>>>,
    details: Arc<RwLock<HashMap<String, String>>>,
    payloads: Arc<RwLock<HashMap<String, TorrentPage>>>,
    /// Detail keys or identifiers that fail with a connection error.
    failing: Arc<RwLock<HashSet<String>>>,
    detail_calls: Arc<RwLock<Vec<String>>>,
    payload_calls: Arc<RwLock<Vec<String>>>,
}

impl MockSource {
    /// Create a source with no listing; `fetch_listing` fails until one is set.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_listing(&self, entries: Vec<ListingEntry>) {
        *self.listing.write().await = Some(entries);
    }

    pub async fn set_detail(&self, key: &str, body: impl Into<String>) {
        self.details.write().await.insert(key.to_string(), body.into());
    }

    pub async fn set_payload(&self, external_id: &str, page: TorrentPage) {
        self.payloads
            .write()
            .await
            .insert(external_id.to_string(), page);
    }

    /// Make fetches for this detail key or identifier fail.
    pub async fn fail_on(&self, key_or_id: &str) {
        self.failing.write().await.insert(key_or_id.to_string());
    }

    /// Keys passed to `fetch_detail`, in call order.
    pub async fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.read().await.clone()
    }

    /// Identifiers passed to `fetch_payload`, in call order.
    pub async fn payload_calls(&self) -> Vec<String> {
        self.payload_calls.read().await.clone()
    }
}

#[async_trait]
impl SourceAdapter for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_listing(&self) -> Result<Vec<ListingEntry>, SourceError> {
        self.listing
            .read()
            .await
            .clone()
            .ok_or(SourceError::Http {
                status: 503,
                url: "mock://listing".to_string(),
            })
    }

    async fn fetch_detail(&self, key: &str) -> Result<String, SourceError> {
        self.detail_calls.write().await.push(key.to_string());

        if self.failing.read().await.contains(key) {
            return Err(SourceError::ConnectionFailed(format!("mock failure for {}", key)));
        }

        self.details
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| SourceError::Http {
                status: 404,
                url: key.to_string(),
            })
    }

    async fn fetch_payload(&self, external_id: &ExternalId) -> Result<TorrentPage, SourceError> {
        let id = external_id.as_str();
        self.payload_calls.write().await.push(id.to_string());

        if self.failing.read().await.contains(id) {
            return Err(SourceError::Timeout(format!("mock timeout for {}", id)));
        }

        Ok(self
            .payloads
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default())
    }
}
