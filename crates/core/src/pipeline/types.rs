//! Messages and run summaries for the pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::source::TorrentPage;

/// A resolved record paired with the torrents fetched for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedRecord {
    pub record: Record,
    pub payload: TorrentPage,
}

/// What travels over the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueMessage {
    Batch { records: Vec<ScrapedRecord> },
    /// Published once after the last batch of a run.
    ///
    /// The producer sends it without `ended_at`. The first consumer to reach
    /// it stamps the time and every consumer passes the stamped copy on, so a
    /// copy left in the queue after the run is recognisable as stale.
    EndOfStream {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ended_at: Option<DateTime<Utc>>,
    },
}

impl QueueMessage {
    /// The marker as the producer publishes it.
    pub fn end_of_stream() -> Self {
        Self::EndOfStream { ended_at: None }
    }

    /// Whether this is a marker from a run that ended at or before `since`.
    pub fn ended_before(&self, since: DateTime<Utc>) -> bool {
        matches!(self, Self::EndOfStream { ended_at: Some(t) } if *t <= since)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Outcome of a listing refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Entries that failed validation.
    pub errors: usize,
}

/// Outcome of an identifier resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolveSummary {
    pub attempted: usize,
    pub found: usize,
    pub batches: usize,
}

/// Outcome of a producer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProduceSummary {
    /// Records handed to the producer after filtering.
    pub records: usize,
    pub batches_published: usize,
    /// Records whose payload fetch failed and were left out.
    pub fetch_failures: usize,
    pub items: usize,
}

/// Outcome of a consumer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumeSummary {
    pub batches: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub errors: usize,
    /// Keys newly added to the completed set.
    pub completed: usize,
    /// Messages that could not be decoded and were dropped.
    pub dropped: usize,
    /// End-of-stream markers left over from earlier runs.
    pub stale_markers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_end_of_stream_wire_format() {
        let bytes = QueueMessage::end_of_stream().encode().unwrap();
        assert_eq!(bytes, br#"{"type":"end_of_stream"}"#);
    }

    #[test]
    fn test_stamped_end_of_stream() {
        let ended = Utc::now();
        let message = QueueMessage::EndOfStream {
            ended_at: Some(ended),
        };
        let value: serde_json::Value =
            serde_json::from_slice(&message.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "end_of_stream");
        assert!(value["ended_at"].is_string());

        assert!(message.ended_before(ended));
        assert!(!message.ended_before(ended - chrono::Duration::seconds(1)));
        assert!(!QueueMessage::end_of_stream().ended_before(ended));
    }

    #[test]
    fn test_batch_wire_format() {
        let message = QueueMessage::Batch {
            records: vec![ScrapedRecord {
                record: fixtures::resolved_record(
                    "https://eztvx.to/shows/2583/breaking-bad/",
                    "Breaking Bad",
                    "tt0903747",
                ),
                payload: fixtures::page(&["abcd"]),
            }],
        };

        let value: serde_json::Value =
            serde_json::from_slice(&message.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "batch");
        assert_eq!(value["records"][0]["record"]["external_id"], "tt0903747");
        assert_eq!(value["records"][0]["payload"]["torrents"][0]["hash"], "abcd");

        let decoded = QueueMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(QueueMessage::decode(b"not json").is_err());
        assert!(QueueMessage::decode(br#"{"type":"bogus"}"#).is_err());
    }
}
