//! Keyed record cache with staleness tracking and snapshot persistence.

mod record_cache;

pub use record_cache::{CacheSnapshot, RecordCache};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
