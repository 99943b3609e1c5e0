//! Testing utilities and mock implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use showcrawl_core::testing::{fixtures, MockSource};
//!
//! let source = MockSource::new();
//! source.set_listing(vec![fixtures::listing_entry("https://eztvx.to/shows/1/a/", "A")]).await;
//! source.set_detail("https://eztvx.to/shows/1/a/", fixtures::detail_page("tt0000001")).await;
//! source.set_payload("tt0000001", fixtures::page(&["abcd"])).await;
//! ```

mod mock_source;

pub use mock_source::MockSource;

/// Start a local HTTP endpoint that accepts connections and never answers.
///
/// Returns its base URL.
pub async fn stalled_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local listener");
    let addr = listener.local_addr().expect("local listener address");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::record::{ExternalId, Record};
    use crate::source::{ListingEntry, TorrentEntry, TorrentPage};

    /// A `tv` record without an external identifier.
    pub fn record(key: &str, title: &str) -> Record {
        Record::new(key, title, "tv", "Airing: Monday").unwrap()
    }

    /// A `tv` record with its external identifier set.
    pub fn resolved_record(key: &str, title: &str, external_id: &str) -> Record {
        record(key, title).with_external_id(ExternalId::parse(external_id).unwrap())
    }

    /// Three unresolved records.
    pub fn records() -> Vec<Record> {
        vec![
            record("https://eztvx.to/shows/2583/breaking-bad/", "Breaking Bad"),
            record("https://eztvx.to/shows/481/game-of-thrones/", "Game of Thrones"),
            record(
                "https://eztvx.to/shows/575979/10-things-to-know-about/",
                "10 Things to Know About",
            ),
        ]
    }

    pub fn listing_entry(key: &str, title: &str) -> ListingEntry {
        ListingEntry {
            key: key.to_string(),
            title: title.to_string(),
            status: "Airing: Monday".to_string(),
            kind: "tv".to_string(),
        }
    }

    /// A detail page linking to the given IMDb title.
    pub fn detail_page(external_id: &str) -> String {
        format!(
            r#"<html><body><a href="https://www.imdb.com/title/{}/" target="_blank">IMDb</a></body></html>"#,
            external_id
        )
    }

    pub fn torrent_entry(hash: &str) -> TorrentEntry {
        TorrentEntry {
            title: format!("Episode {}", hash),
            hash: hash.to_string(),
            size_bytes: 734_003_200,
            seeds: 12,
            peers: 3,
        }
    }

    /// A payload with one entry per hash.
    pub fn page(hashes: &[&str]) -> TorrentPage {
        TorrentPage {
            torrents: hashes.iter().map(|h| torrent_entry(h)).collect(),
        }
    }
}
