//! Durable message queue between producer and consumers.

mod sqlite;

pub use sqlite::{QueueOptions, SqliteQueue};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unknown delivery: {0}")]
    UnknownDelivery(i64),
}

/// A message claimed by a consumer, to be acknowledged once handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: i64,
    pub body: Vec<u8>,
    /// Times this message has been handed out, this delivery included.
    pub attempts: u32,
}

/// One named queue with at-least-once delivery.
///
/// A delivery that is never acknowledged becomes visible again after the
/// implementation's visibility timeout.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Append a message.
    async fn publish(&self, body: &[u8]) -> Result<i64, QueueError>;

    /// Claim the oldest available message, waiting until one appears.
    async fn receive(&self) -> Result<Delivery, QueueError>;

    /// Claim the oldest available message without waiting.
    async fn try_receive(&self) -> Result<Option<Delivery>, QueueError>;

    /// Remove a delivered message for good.
    async fn ack(&self, id: i64) -> Result<(), QueueError>;

    /// Drop every message in the queue. Returns how many were removed.
    async fn purge(&self) -> Result<usize, QueueError>;

    /// Messages not yet acknowledged (claimed or not).
    async fn pending(&self) -> Result<usize, QueueError>;
}
