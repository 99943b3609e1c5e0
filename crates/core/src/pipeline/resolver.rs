use std::path::Path;

use tracing::{debug, info, warn};

use crate::cache::{CacheError, RecordCache};
use crate::metrics::RESOLVE_ATTEMPTS;
use crate::source::{extract_external_id, RateLimiter, SourceAdapter};

use super::{PipelineError, ResolveSummary};

/// Look up external identifiers for `keys`, `batch_size` detail fetches at a
/// time.
///
/// A failed fetch counts as "not found" for that key. The cache snapshot is
/// written to `cache_path` after every batch, so a crash loses at most the
/// batch in flight.
pub async fn resolve_external_ids(
    cache: &RecordCache,
    source: &dyn SourceAdapter,
    limiter: &RateLimiter,
    keys: &[String],
    batch_size: usize,
    cache_path: &Path,
) -> Result<ResolveSummary, PipelineError> {
    let mut summary = ResolveSummary {
        attempted: keys.len(),
        ..Default::default()
    };
    if keys.is_empty() {
        debug!("No records missing an external identifier");
        return Ok(summary);
    }

    let total = keys.len();
    let mut processed = 0;

    for batch in keys.chunks(batch_size.max(1)) {
        let fetches: Vec<_> = batch
            .iter()
            .map(|key| async move {
                limiter.acquire().await;
                (key, source.fetch_detail(key).await)
            })
            .collect();

        let results = futures::future::join_all(fetches).await;

        let mut found = 0;
        for (key, result) in results {
            let external_id = match result {
                Ok(body) => extract_external_id(&body),
                Err(e) => {
                    warn!(key = %key, error = %e, "Detail fetch failed");
                    RESOLVE_ATTEMPTS.with_label_values(&["error"]).inc();
                    continue;
                }
            };

            let Some(external_id) = external_id else {
                debug!(key = %key, "No external identifier on detail page");
                RESOLVE_ATTEMPTS.with_label_values(&["not_found"]).inc();
                continue;
            };

            let mut record = match cache.get(key).await {
                Ok(r) => r,
                Err(CacheError::NotFound(_)) => {
                    warn!(key = %key, "Resolved key is not in the cache");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            record.external_id = Some(external_id);
            cache.update(record).await?;

            found += 1;
            RESOLVE_ATTEMPTS.with_label_values(&["found"]).inc();
        }

        cache.save(cache_path).await?;

        processed += batch.len();
        summary.found += found;
        summary.batches += 1;
        info!(
            progress = %format!("{:.1}%", processed as f64 * 100.0 / total as f64),
            found = found,
            batch_size = batch.len(),
            "Resolved batch {}/{}",
            summary.batches,
            total.div_ceil(batch_size.max(1))
        );
    }

    Ok(summary)
}
