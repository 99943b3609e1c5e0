use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::checkpoint::CompletedSet;
use crate::ingest::{IngestionStore, InsertOutcome, NewTorrent};
use crate::metrics::{BATCHES_CONSUMED, ITEMS_INGESTED};
use crate::queue::MessageQueue;

use super::{ConsumeSummary, PipelineError, QueueMessage, ScrapedRecord};

/// Per-record ingestion tally.
#[derive(Debug, Default)]
struct RecordTally {
    inserted: usize,
    duplicates: usize,
    errors: usize,
}

/// Read batches until the end-of-stream marker, ingesting every item.
///
/// After each batch the keys whose items all landed (inserted or already
/// present) join the completed set, its snapshot is written to
/// `checkpoint_path`, and only then is the batch acknowledged. The marker is
/// published again, stamped with the time the run ended, before returning
/// so other consumers on the same queue stop too. A stamped marker from a
/// run that ended before this consumer started is dropped.
///
/// Records of a batch are ingested one after another; the store is
/// synchronous and the task yields between records.
pub async fn consume(
    queue: &dyn MessageQueue,
    store: &dyn IngestionStore,
    checkpoint: &CompletedSet,
    checkpoint_path: &Path,
    source_tag: &str,
) -> Result<ConsumeSummary, PipelineError> {
    let started_at = Utc::now();
    let mut summary = ConsumeSummary::default();

    loop {
        let delivery = queue.receive().await?;

        let records = match QueueMessage::decode(&delivery.body) {
            Ok(QueueMessage::Batch { records }) => records,
            Ok(marker @ QueueMessage::EndOfStream { .. }) if marker.ended_before(started_at) => {
                debug!(id = delivery.id, "Dropping end-of-stream marker of an earlier run");
                queue.ack(delivery.id).await?;
                summary.stale_markers += 1;
                continue;
            }
            Ok(QueueMessage::EndOfStream { ended_at }) => {
                let relay = QueueMessage::EndOfStream {
                    ended_at: Some(ended_at.unwrap_or_else(Utc::now)),
                };
                queue.publish(&relay.encode()?).await?;
                queue.ack(delivery.id).await?;
                info!(
                    batches = summary.batches,
                    inserted = summary.inserted,
                    duplicates = summary.duplicates,
                    "End of stream, consumer stopping"
                );
                return Ok(summary);
            }
            Err(e) => {
                warn!(id = delivery.id, error = %e, "Dropping undecodable message");
                queue.ack(delivery.id).await?;
                summary.dropped += 1;
                continue;
            }
        };

        let batch_len = records.len();
        let mut results = Vec::with_capacity(batch_len);
        for scraped in &records {
            results.push((scraped, ingest_record(store, scraped, source_tag)));
            tokio::task::yield_now().await;
        }

        let mut completed = 0;
        for (scraped, tally) in results {
            summary.inserted += tally.inserted;
            summary.duplicates += tally.duplicates;
            summary.errors += tally.errors;

            if tally.errors > 0 {
                warn!(
                    key = %scraped.record.key,
                    errors = tally.errors,
                    "Record not checkpointed, store errors"
                );
                continue;
            }
            if checkpoint.add(scraped.record.key.clone()).await {
                completed += 1;
            }
        }

        checkpoint.save(checkpoint_path).await?;
        queue.ack(delivery.id).await?;

        summary.batches += 1;
        summary.completed += completed;
        BATCHES_CONSUMED.inc();
        info!(
            records = batch_len,
            completed = completed,
            "Consumed batch {}",
            summary.batches
        );
    }
}

fn ingest_record(store: &dyn IngestionStore, scraped: &ScrapedRecord, source_tag: &str) -> RecordTally {
    let record = &scraped.record;
    let mut tally = RecordTally::default();

    for entry in &scraped.payload.torrents {
        let torrent = NewTorrent::from_entry(
            entry,
            source_tag,
            record.kind.as_str(),
            record.external_id.clone(),
        );

        let outcome = if torrent.fingerprint.is_empty() {
            warn!(key = %record.key, name = %torrent.name, "Torrent without a hash");
            Err(None)
        } else {
            match store.exists(&torrent.fingerprint, source_tag) {
                Ok(true) => Ok(InsertOutcome::Duplicate),
                Ok(false) => store.insert(&torrent).map_err(Some),
                Err(e) => Err(Some(e)),
            }
        };

        match outcome {
            Ok(InsertOutcome::Inserted) => {
                tally.inserted += 1;
                ITEMS_INGESTED.with_label_values(&["inserted"]).inc();
            }
            Ok(InsertOutcome::Duplicate) => {
                debug!(fingerprint = %torrent.fingerprint, "Already ingested");
                tally.duplicates += 1;
                ITEMS_INGESTED.with_label_values(&["duplicate"]).inc();
            }
            Err(e) => {
                if let Some(e) = e {
                    warn!(fingerprint = %torrent.fingerprint, error = %e, "Insert failed");
                }
                tally.errors += 1;
                ITEMS_INGESTED.with_label_values(&["error"]).inc();
            }
        }
    }

    tally
}
