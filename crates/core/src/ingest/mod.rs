//! Ingestion store: the relational sink for torrents, deduplicated on
//! (fingerprint, source).

mod sqlite;

pub use sqlite::SqliteIngestionStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::ExternalId;
use crate::source::TorrentEntry;

/// Errors from the ingestion store.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid table name: {0}")]
    InvalidTable(String),
}

/// Whether an insert created a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    Inserted,
    /// The (fingerprint, source) pair was already stored.
    Duplicate,
}

/// A torrent ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTorrent {
    pub name: String,
    pub source: String,
    pub category: String,
    /// Uppercased content hash.
    pub fingerprint: String,
    pub size: u64,
    pub seeders: u32,
    pub leechers: u32,
    pub external_id: Option<ExternalId>,
}

impl NewTorrent {
    /// Build a row from a payload entry; the fingerprint is uppercased.
    pub fn from_entry(
        entry: &TorrentEntry,
        source: &str,
        category: &str,
        external_id: Option<ExternalId>,
    ) -> Self {
        Self {
            name: entry.title.clone(),
            source: source.to_string(),
            category: category.to_string(),
            fingerprint: normalize_fingerprint(&entry.hash),
            size: entry.size_bytes,
            seeders: entry.seeds,
            leechers: entry.peers,
            external_id,
        }
    }
}

/// Uppercase form used for both the existence check and the insert.
pub fn normalize_fingerprint(hash: &str) -> String {
    hash.trim().to_uppercase()
}

/// A table name usable unquoted: ASCII letters, digits and underscores,
/// not starting with a digit.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Trait for the ingestion sink.
///
/// The uniqueness constraint on (fingerprint, source) is authoritative;
/// `exists` is only a shortcut that saves a write.
pub trait IngestionStore: Send + Sync {
    /// Check whether a (fingerprint, source) pair is stored.
    fn exists(&self, fingerprint: &str, source: &str) -> Result<bool, IngestError>;

    /// Insert a torrent; a unique-constraint conflict is a `Duplicate`.
    fn insert(&self, torrent: &NewTorrent) -> Result<InsertOutcome, IngestError>;

    /// Number of stored rows.
    fn count(&self) -> Result<u64, IngestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_entry_uppercases_fingerprint() {
        let entry = TorrentEntry {
            title: "Show S01E01".to_string(),
            hash: " abcd1234 ".to_string(),
            size_bytes: 1024,
            seeds: 5,
            peers: 2,
        };
        let torrent = NewTorrent::from_entry(&entry, "EZTV", "tv", None);
        assert_eq!(torrent.fingerprint, "ABCD1234");
        assert_eq!(torrent.size, 1024);
        assert_eq!(torrent.leechers, 2);
    }

    #[test]
    fn test_table_names() {
        assert!(is_valid_table_name("ingested_torrents"));
        assert!(is_valid_table_name("_t2"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("2torrents"));
        assert!(!is_valid_table_name("torrents;drop"));
        assert!(!is_valid_table_name("schema.table"));
    }
}
