//! The crawl pipeline: refresh, resolve, produce, consume.
//!
//! Stages run batch by batch. Within a batch every fetch runs concurrently
//! behind the shared [`RateLimiter`](crate::source::RateLimiter); the next
//! batch only starts once the previous one's snapshot is on disk.

mod consumer;
mod producer;
mod refresh;
mod resolver;
mod runner;
mod types;

pub use consumer::consume;
pub use producer::produce;
pub use refresh::refresh_listing;
pub use resolver::resolve_external_ids;
pub use runner::{run_consumer, run_producer};
pub use types::*;

use thiserror::Error;

use crate::cache::CacheError;
use crate::checkpoint::CheckpointError;
use crate::ingest::IngestError;
use crate::queue::QueueError;
use crate::source::SourceError;

/// Errors that stop a pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Store error: {0}")]
    Store(#[from] IngestError),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
