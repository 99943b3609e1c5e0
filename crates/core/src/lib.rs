pub mod cache;
pub mod checkpoint;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod source;
pub mod testing;

mod snapshot;

pub use cache::{CacheError, CacheSnapshot, RecordCache};
pub use checkpoint::{CheckpointError, CompletedSet};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, PipelineConfig,
    QueueConfig, SourceConfig, StoreConfig,
};
pub use ingest::{IngestError, IngestionStore, InsertOutcome, NewTorrent, SqliteIngestionStore};
pub use pipeline::{
    run_consumer, run_producer, ConsumeSummary, PipelineError, ProduceSummary, QueueMessage,
    RefreshStats, ResolveSummary, ScrapedRecord,
};
pub use queue::{Delivery, MessageQueue, QueueError, QueueOptions, SqliteQueue};
pub use record::{ExternalId, MediaKind, Record, RecordError};
pub use source::{
    EztvSource, ListingEntry, RateLimiter, SourceAdapter, SourceError, TorrentEntry, TorrentPage,
};
