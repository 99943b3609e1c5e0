use tracing::{debug, info, warn};

use crate::metrics::{BATCHES_PUBLISHED, PAYLOAD_FETCHES};
use crate::queue::MessageQueue;
use crate::record::Record;
use crate::source::{RateLimiter, SourceAdapter};

use super::{PipelineError, ProduceSummary, QueueMessage, ScrapedRecord};

/// Fetch payloads for `records` in batches and publish each batch, then the
/// end-of-stream marker.
///
/// Records without an external identifier are skipped. A failed payload
/// fetch leaves that record out of its batch; a batch with nothing left is
/// not published.
pub async fn produce(
    records: Vec<Record>,
    source: &dyn SourceAdapter,
    limiter: &RateLimiter,
    queue: &dyn MessageQueue,
    batch_size: usize,
) -> Result<ProduceSummary, PipelineError> {
    let records: Vec<Record> = records
        .into_iter()
        .filter(|r| r.external_id.is_some())
        .collect();

    let mut summary = ProduceSummary {
        records: records.len(),
        ..Default::default()
    };
    let total = records.len();
    let batch_count = total.div_ceil(batch_size.max(1));
    let mut processed = 0;

    for (index, batch) in records.chunks(batch_size.max(1)).enumerate() {
        let fetches: Vec<_> = batch
            .iter()
            .filter_map(|record| {
                let external_id = record.external_id.as_ref()?;
                Some(async move {
                    limiter.acquire().await;
                    (record, source.fetch_payload(external_id).await)
                })
            })
            .collect();

        let results = futures::future::join_all(fetches).await;

        let mut scraped = Vec::with_capacity(results.len());
        for (record, result) in results {
            match result {
                Ok(payload) => {
                    PAYLOAD_FETCHES.with_label_values(&["success"]).inc();
                    summary.items += payload.torrents.len();
                    scraped.push(ScrapedRecord {
                        record: record.clone(),
                        payload,
                    });
                }
                Err(e) => {
                    PAYLOAD_FETCHES.with_label_values(&["error"]).inc();
                    summary.fetch_failures += 1;
                    warn!(key = %record.key, error = %e, "Payload fetch failed, leaving record out");
                }
            }
        }

        processed += batch.len();

        if scraped.is_empty() {
            warn!("Batch {}/{} produced nothing to publish", index + 1, batch_count);
            continue;
        }

        let body = QueueMessage::Batch { records: scraped }.encode()?;
        queue.publish(&body).await?;
        summary.batches_published += 1;
        BATCHES_PUBLISHED.inc();

        info!(
            progress = %format!("{:.1}%", processed as f64 * 100.0 / total as f64),
            "Published batch {}/{}",
            index + 1,
            batch_count
        );
    }

    queue.publish(&QueueMessage::end_of_stream().encode()?).await?;
    debug!("End of stream published");

    Ok(summary)
}
