//! SQLite-backed durable queue.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::{Delivery, MessageQueue, QueueError};
use crate::config::QueueConfig;

/// Queue behaviour knobs.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Queue name; several queues can share one database file.
    pub name: String,
    /// Sleep between empty polls in `receive`.
    pub poll_interval: Duration,
    /// Age after which an unacknowledged claim is handed out again.
    pub visibility_timeout: Duration,
}

impl From<&QueueConfig> for QueueOptions {
    fn from(config: &QueueConfig) -> Self {
        Self {
            name: config.name.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            visibility_timeout: Duration::from_secs(config.visibility_timeout_secs),
        }
    }
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

/// Durable queue in a SQLite table.
///
/// Claims happen inside an immediate transaction, so several processes can
/// share the file without handing the same message to two consumers at once.
pub struct SqliteQueue {
    conn: Mutex<Connection>,
    options: QueueOptions,
}

impl SqliteQueue {
    /// Open (or create) the queue database at `path`.
    pub fn new(path: &Path, options: QueueOptions) -> Result<Self, QueueError> {
        let conn = Connection::open(path).map_err(|e| QueueError::Database(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| QueueError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            options,
        })
    }

    /// Create an in-memory queue (useful for testing).
    pub fn in_memory(options: QueueOptions) -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory().map_err(|e| QueueError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            options,
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), QueueError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS queue_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue TEXT NOT NULL,
                body BLOB NOT NULL,
                enqueued_at TEXT NOT NULL,
                claimed_at INTEGER,
                attempts INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_queue_messages_queue ON queue_messages(queue, id);
            "#,
        )
        .map_err(|e| QueueError::Database(e.to_string()))?;

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    fn claim_next(&self) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| QueueError::Database(e.to_string()))?;

        let now = Utc::now().timestamp_millis();
        let expired_before = now - self.options.visibility_timeout.as_millis() as i64;

        let next: Option<(i64, Vec<u8>, u32)> = tx
            .query_row(
                r#"
                SELECT id, body, attempts FROM queue_messages
                WHERE queue = ?1 AND (claimed_at IS NULL OR claimed_at <= ?2)
                ORDER BY id
                LIMIT 1
                "#,
                params![self.options.name, expired_before],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|e| QueueError::Database(e.to_string()))?;

        let Some((id, body, attempts)) = next else {
            return Ok(None);
        };

        tx.execute(
            "UPDATE queue_messages SET claimed_at = ?1, attempts = attempts + 1 WHERE id = ?2",
            params![now, id],
        )
        .map_err(|e| QueueError::Database(e.to_string()))?;

        tx.commit().map_err(|e| QueueError::Database(e.to_string()))?;

        if attempts > 0 {
            debug!(queue = %self.options.name, id = id, attempts = attempts + 1, "Redelivering message");
        }

        Ok(Some(Delivery {
            id,
            body,
            attempts: attempts + 1,
        }))
    }
}

#[async_trait]
impl MessageQueue for SqliteQueue {
    async fn publish(&self, body: &[u8]) -> Result<i64, QueueError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO queue_messages (queue, body, enqueued_at) VALUES (?1, ?2, ?3)",
            params![self.options.name, body, Utc::now().to_rfc3339()],
        )
        .map_err(|e| QueueError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    async fn receive(&self) -> Result<Delivery, QueueError> {
        loop {
            if let Some(delivery) = self.claim_next()? {
                return Ok(delivery);
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }

    async fn try_receive(&self) -> Result<Option<Delivery>, QueueError> {
        self.claim_next()
    }

    async fn ack(&self, id: i64) -> Result<(), QueueError> {
        let conn = self.conn.lock().unwrap();
        let rows = conn
            .execute(
                "DELETE FROM queue_messages WHERE id = ?1 AND queue = ?2",
                params![id, self.options.name],
            )
            .map_err(|e| QueueError::Database(e.to_string()))?;

        if rows == 0 {
            return Err(QueueError::UnknownDelivery(id));
        }
        Ok(())
    }

    async fn purge(&self) -> Result<usize, QueueError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM queue_messages WHERE queue = ?1",
            params![self.options.name],
        )
        .map_err(|e| QueueError::Database(e.to_string()))
    }

    async fn pending(&self) -> Result<usize, QueueError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM queue_messages WHERE queue = ?1",
                params![self.options.name],
                |row| row.get(0),
            )
            .map_err(|e| QueueError::Database(e.to_string()))?;

        Ok(count as usize)
    }
}
