//! Producer and consumer entry points wired from configuration.

use tracing::{debug, error, info};

use crate::cache::RecordCache;
use crate::checkpoint::CompletedSet;
use crate::config::Config;
use crate::ingest::IngestionStore;
use crate::queue::MessageQueue;
use crate::source::{RateLimiter, SourceAdapter};

use super::{
    consume, produce, refresh_listing, resolve_external_ids, ConsumeSummary, PipelineError,
    ProduceSummary,
};

/// Run the producer side: refresh, resolve, then publish everything not yet
/// completed.
///
/// The queue is purged first, since anything left over belongs to keys that
/// are not checkpointed and will be regenerated. The listing is crawled
/// again when the cache is stale or `force_refresh` is set; a failed crawl
/// is logged and the existing cache is used.
pub async fn run_producer(
    config: &Config,
    source: &dyn SourceAdapter,
    queue: &dyn MessageQueue,
    force_refresh: bool,
) -> Result<ProduceSummary, PipelineError> {
    let pipeline = &config.pipeline;
    let limit = pipeline.processing_limit();
    let cache_path = pipeline.cache_path();
    let limiter = RateLimiter::new(config.source.requests_per_second);

    let purged = queue.purge().await?;
    if purged > 0 {
        info!(purged = purged, "Purged leftover queue messages");
    }

    let cache = RecordCache::load(&cache_path).await;
    let cached = cache.len().await;
    info!(records = cached, path = %cache_path.display(), "Cache loaded");

    if force_refresh || cache.is_stale(pipeline.cache_max_age()).await {
        match refresh_listing(&cache, source, &limiter, limit).await {
            Ok(stats) => {
                info!(
                    new = stats.new,
                    updated = stats.updated,
                    unchanged = stats.unchanged,
                    errors = stats.errors,
                    "Listing refreshed"
                );
                cache.save(&cache_path).await?;
            }
            Err(PipelineError::Source(e)) => {
                error!(error = %e, "Listing refresh failed, continuing with cached records");
            }
            Err(e) => return Err(e),
        }
    }

    let mut missing = cache.missing_external_ids().await;
    if let Some(limit) = limit {
        missing.truncate(limit);
    }
    let resolved = resolve_external_ids(
        &cache,
        source,
        &limiter,
        &missing,
        pipeline.batch_size,
        &cache_path,
    )
    .await?;
    info!(
        attempted = resolved.attempted,
        found = resolved.found,
        "Identifier resolution finished"
    );

    let checkpoint = CompletedSet::load(&pipeline.checkpoint_path()).await;
    let mut pending = Vec::new();
    for record in cache.resolved().await {
        if !checkpoint.contains(&record.key).await {
            pending.push(record);
        }
    }
    if let Some(limit) = limit {
        pending.truncate(limit);
    }
    let completed = checkpoint.len().await;
    info!(
        pending = pending.len(),
        completed = completed,
        "Records selected for production"
    );

    let summary = produce(pending, source, &limiter, queue, pipeline.batch_size).await?;
    info!(
        batches = summary.batches_published,
        items = summary.items,
        fetch_failures = summary.fetch_failures,
        "Producer finished"
    );
    let status = limiter.status().await;
    debug!(?status, "Rate limiter state");

    Ok(summary)
}

/// Run one consumer until it sees the end-of-stream marker.
pub async fn run_consumer(
    config: &Config,
    store: &dyn IngestionStore,
    queue: &dyn MessageQueue,
) -> Result<ConsumeSummary, PipelineError> {
    let checkpoint_path = config.pipeline.checkpoint_path();
    let checkpoint = CompletedSet::load(&checkpoint_path).await;
    let completed = checkpoint.len().await;
    info!(completed = completed, "Checkpoint loaded");

    consume(
        queue,
        store,
        &checkpoint,
        &checkpoint_path,
        &config.store.source_tag,
    )
    .await
}
