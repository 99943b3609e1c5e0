use tracing::{debug, info, warn};

use crate::cache::{CacheError, RecordCache};
use crate::metrics::LISTING_RECORDS;
use crate::record::Record;
use crate::source::{RateLimiter, SourceAdapter};

use super::{PipelineError, RefreshStats};

/// Crawl the full listing into the cache.
///
/// New keys are added. Known keys keep their external identifier and get
/// title, kind and status from the listing; they only count as updated when
/// that changes something. A listing failure leaves the cache untouched,
/// `last_refreshed` included.
pub async fn refresh_listing(
    cache: &RecordCache,
    source: &dyn SourceAdapter,
    limiter: &RateLimiter,
    limit: Option<usize>,
) -> Result<RefreshStats, PipelineError> {
    limiter.acquire().await;
    let mut entries = source.fetch_listing().await?;
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    info!(source = source.name(), entries = entries.len(), "Listing fetched");

    let mut stats = RefreshStats::default();

    for entry in entries {
        let record = match Record::new(&entry.key, &entry.title, &entry.kind, &entry.status) {
            Ok(r) => r,
            Err(e) => {
                warn!(key = %entry.key, error = %e, "Skipping invalid listing entry");
                stats.errors += 1;
                LISTING_RECORDS.with_label_values(&["error"]).inc();
                continue;
            }
        };

        let result = match cache.get(&record.key).await {
            Ok(mut existing) => {
                existing.title = record.title;
                existing.kind = record.kind;
                existing.status = record.status;
                if cache.update(existing).await? {
                    stats.updated += 1;
                    "updated"
                } else {
                    stats.unchanged += 1;
                    "unchanged"
                }
            }
            Err(CacheError::NotFound(_)) => {
                cache.add(record).await;
                stats.new += 1;
                "new"
            }
            Err(e) => return Err(e.into()),
        };
        LISTING_RECORDS.with_label_values(&[result]).inc();
    }

    cache.mark_refreshed().await;
    debug!(?stats, "Listing merged into cache");

    Ok(stats)
}
