//! EZTV source implementation.

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::SourceConfig;
use crate::metrics::SOURCE_REQUEST_DURATION;
use crate::record::{ExternalId, MediaKind};

use super::extract::parse_listing;
use super::{ListingEntry, SourceAdapter, SourceError, TorrentPage};

/// EZTV listing, show pages and torrent API.
pub struct EztvSource {
    client: Client,
    config: SourceConfig,
}

impl EztvSource {
    /// Create a new EztvSource with the given configuration.
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| SourceError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Build the torrent API URL for an identifier.
    fn payload_url(&self, external_id: &ExternalId) -> String {
        format!(
            "{}/api/get-torrents?imdb_id={}&limit={}",
            self.config.base(),
            urlencoding::encode(external_id.digits()),
            self.config.payload_page_size
        )
    }

    /// GET a URL, mapping transport failures and non-2xx statuses.
    async fn get(&self, url: &str, operation: &str) -> Result<reqwest::Response, SourceError> {
        let start = Instant::now();
        let result = self.client.get(url).send().await;

        let response = match result {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                observe(operation, "error", start);
                return Err(SourceError::Http {
                    status: r.status().as_u16(),
                    url: url.to_string(),
                });
            }
            Err(e) => {
                observe(operation, "error", start);
                return Err(if e.is_timeout() {
                    SourceError::Timeout(url.to_string())
                } else if e.is_connect() {
                    SourceError::ConnectionFailed(e.to_string())
                } else {
                    SourceError::Request(e.to_string())
                });
            }
        };

        observe(operation, "success", start);
        Ok(response)
    }
}

fn observe(operation: &str, status: &str, start: Instant) {
    SOURCE_REQUEST_DURATION
        .with_label_values(&[operation, status])
        .observe(start.elapsed().as_secs_f64());
}

#[async_trait]
impl SourceAdapter for EztvSource {
    fn name(&self) -> &str {
        "eztv"
    }

    async fn fetch_listing(&self) -> Result<Vec<ListingEntry>, SourceError> {
        let url = self.config.listing_url();
        debug!(url = %url, "Fetching listing");

        let body = self
            .get(&url, "listing")
            .await?
            .text()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let entries = parse_listing(&body, self.config.base(), MediaKind::Tv.as_str())?;
        debug!(entries = entries.len(), "Listing parsed");
        Ok(entries)
    }

    async fn fetch_detail(&self, key: &str) -> Result<String, SourceError> {
        self.get(key, "detail")
            .await?
            .text()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))
    }

    async fn fetch_payload(&self, external_id: &ExternalId) -> Result<TorrentPage, SourceError> {
        let url = self.payload_url(external_id);
        debug!(external_id = %external_id, "Fetching payload");

        self.get(&url, "payload")
            .await?
            .json::<TorrentPage>()
            .await
            .map_err(|e| SourceError::Parse(format!("payload for {}: {}", external_id, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(base_url: &str) -> EztvSource {
        EztvSource::new(SourceConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_payload_url() {
        let source = source("https://eztvx.to/");
        let id = ExternalId::parse("tt0903747").unwrap();
        assert_eq!(
            source.payload_url(&id),
            "https://eztvx.to/api/get-torrents?imdb_id=0903747&limit=100"
        );
    }

    #[test]
    fn test_payload_url_respects_page_size() {
        let source = EztvSource::new(SourceConfig {
            payload_page_size: 30,
            ..Default::default()
        })
        .unwrap();
        let id = ExternalId::from_number(12680866);
        assert!(source.payload_url(&id).ends_with("imdb_id=12680866&limit=30"));
    }

    #[test]
    fn test_name() {
        assert_eq!(source("https://eztvx.to").name(), "eztv");
    }

    #[tokio::test]
    async fn test_stalled_request_times_out() {
        let source = EztvSource::new(SourceConfig {
            base_url: crate::testing::stalled_server().await,
            timeout_secs: 1,
            ..Default::default()
        })
        .unwrap();

        let id = ExternalId::parse("tt0903747").unwrap();
        let err = source.fetch_payload(&id).await.unwrap_err();
        assert!(matches!(err, SourceError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_error() {
        // Nothing listens on port 9 locally.
        let source = source("http://127.0.0.1:9");
        let err = source.fetch_listing().await.unwrap_err();
        assert!(matches!(
            err,
            SourceError::ConnectionFailed(_) | SourceError::Request(_)
        ));
    }
}
