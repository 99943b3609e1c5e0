//! SQLite-backed ingestion store.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};

use super::{is_valid_table_name, IngestError, IngestionStore, InsertOutcome, NewTorrent};

/// SQLite-backed ingestion store writing to one table.
pub struct SqliteIngestionStore {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteIngestionStore {
    /// Open the store at `path`, creating `table` if needed.
    pub fn new(path: &Path, table: &str) -> Result<Self, IngestError> {
        let conn = Connection::open(path).map_err(|e| IngestError::Database(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| IngestError::Database(e.to_string()))?;
        Self::with_connection(conn, table)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory(table: &str) -> Result<Self, IngestError> {
        let conn =
            Connection::open_in_memory().map_err(|e| IngestError::Database(e.to_string()))?;
        Self::with_connection(conn, table)
    }

    fn with_connection(conn: Connection, table: &str) -> Result<Self, IngestError> {
        if !is_valid_table_name(table) {
            return Err(IngestError::InvalidTable(table.to_string()));
        }
        Self::initialize_schema(&conn, table)?;
        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
        })
    }

    fn initialize_schema(conn: &Connection, table: &str) -> Result<(), IngestError> {
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                source TEXT NOT NULL,
                category TEXT,
                info_hash TEXT NOT NULL,
                size TEXT,
                seeders INTEGER NOT NULL DEFAULT 0,
                leechers INTEGER NOT NULL DEFAULT 0,
                imdb TEXT,
                processed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(info_hash, source)
            );
            "#
        ))
        .map_err(|e| IngestError::Database(e.to_string()))?;

        Ok(())
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl IngestionStore for SqliteIngestionStore {
    fn exists(&self, fingerprint: &str, source: &str) -> Result<bool, IngestError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE info_hash = ?1 AND source = ?2",
                    self.table
                ),
                params![fingerprint, source],
                |row| row.get(0),
            )
            .map_err(|e| IngestError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    fn insert(&self, torrent: &NewTorrent) -> Result<InsertOutcome, IngestError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            &format!(
                r#"
                INSERT INTO {} (name, source, category, info_hash, size, seeders, leechers, imdb, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                "#,
                self.table
            ),
            params![
                torrent.name,
                torrent.source,
                torrent.category,
                torrent.fingerprint,
                torrent.size.to_string(),
                torrent.seeders,
                torrent.leechers,
                torrent.external_id.as_ref().map(|id| id.as_str()),
                now,
            ],
        );

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(IngestError::Database(e.to_string())),
        }
    }

    fn count(&self) -> Result<u64, IngestError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                row.get(0)
            })
            .map_err(|e| IngestError::Database(e.to_string()))?;

        Ok(count as u64)
    }
}
