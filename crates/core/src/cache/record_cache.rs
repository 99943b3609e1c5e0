use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::CacheError;
use crate::record::Record;
use crate::snapshot;

/// On-disk shape of the cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CacheSnapshot {
    pub last_refreshed: Option<DateTime<Utc>>,
    pub records: BTreeMap<String, Record>,
}

/// In-memory collection of records keyed by `Record::key`.
///
/// All access goes through the methods below, which take the internal lock
/// for the duration of a single operation.
#[derive(Debug, Default)]
pub struct RecordCache {
    inner: Mutex<CacheSnapshot>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CacheSnapshot) -> Self {
        Self {
            inner: Mutex::new(snapshot),
        }
    }

    /// Insert a record if its key is unknown.
    ///
    /// Returns `false` and leaves the stored value alone if the key exists.
    pub async fn add(&self, mut record: Record) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.records.contains_key(&record.key) {
            return false;
        }
        record.last_updated = Some(Utc::now());
        inner.records.insert(record.key.clone(), record);
        true
    }

    /// Copy of the stored record.
    pub async fn get(&self, key: &str) -> Result<Record, CacheError> {
        let inner = self.inner.lock().await;
        inner
            .records
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    /// Replace the stored record if its content differs.
    ///
    /// Returns whether anything changed. `last_updated` is refreshed only on change.
    pub async fn update(&self, mut record: Record) -> Result<bool, CacheError> {
        let mut inner = self.inner.lock().await;
        let current = inner
            .records
            .get_mut(&record.key)
            .ok_or_else(|| CacheError::NotFound(record.key.clone()))?;

        if current.same_content(&record) {
            return Ok(false);
        }

        record.last_updated = Some(Utc::now());
        *current = record;
        Ok(true)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.lock().await.records.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.records.is_empty()
    }

    pub async fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().await.last_refreshed
    }

    /// Record that a full listing pass just finished.
    pub async fn mark_refreshed(&self) {
        self.inner.lock().await.last_refreshed = Some(Utc::now());
    }

    /// True if the cache was never refreshed or the last refresh is older than `max_age`.
    pub async fn is_stale(&self, max_age: Duration) -> bool {
        match self.inner.lock().await.last_refreshed {
            Some(refreshed) => Utc::now() - refreshed > max_age,
            None => true,
        }
    }

    /// Keys of records that still lack an external identifier.
    pub async fn missing_external_ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .records
            .values()
            .filter(|r| r.external_id.is_none())
            .map(|r| r.key.clone())
            .collect()
    }

    /// Records that already carry an external identifier.
    pub async fn resolved(&self) -> Vec<Record> {
        self.inner
            .lock()
            .await
            .records
            .values()
            .filter(|r| r.external_id.is_some())
            .cloned()
            .collect()
    }

    pub async fn snapshot(&self) -> CacheSnapshot {
        self.inner.lock().await.clone()
    }

    /// Write the whole cache to `path`, replacing any previous snapshot.
    pub async fn save(&self, path: &Path) -> Result<(), CacheError> {
        let bytes = {
            let inner = self.inner.lock().await;
            serde_json::to_vec(&*inner)?
        };
        snapshot::write_atomic(path, &bytes).await?;
        debug!(path = %path.display(), "Saved record cache");
        Ok(())
    }

    /// Read a snapshot from `path`.
    ///
    /// A missing or unreadable snapshot yields an empty cache.
    pub async fn load(path: &Path) -> Self {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No record cache snapshot, starting empty");
                return Self::new();
            }
        };

        match serde_json::from_slice::<CacheSnapshot>(&bytes) {
            Ok(snapshot) => {
                debug!(
                    path = %path.display(),
                    records = snapshot.records.len(),
                    "Loaded record cache"
                );
                Self::from_snapshot(snapshot)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt record cache snapshot, starting empty");
                Self::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ExternalId;
    use crate::testing::fixtures;

    fn fixed_timestamp() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-12T09:58:41.306122+00:00")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_add() {
        let cache = RecordCache::new();
        let show = fixtures::record("https://eztvx.to/shows/2583/breaking-bad/", "Breaking Bad");

        assert!(cache.add(show.clone()).await);
        // Second attempt is a no-op
        let mut changed = show.clone();
        changed.status = "Airing".to_string();
        assert!(!cache.add(changed).await);

        let stored = cache.get(&show.key).await.unwrap();
        assert_eq!(stored.status, show.status);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let cache = RecordCache::new();
        let result = cache.get("https://eztvx.to/shows/1/missing/").await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_changes_and_refreshes_timestamp() {
        let cache = RecordCache::new();
        let show = fixtures::record("https://eztvx.to/shows/481/game-of-thrones/", "Game of Thrones");
        cache.add(show.clone()).await;
        let before = cache.get(&show.key).await.unwrap().last_updated.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let mut changed = show.clone();
        changed.status = "Ended".to_string();
        assert!(cache.update(changed.clone()).await.unwrap());

        let after = cache.get(&show.key).await.unwrap();
        assert_eq!(after.status, "Ended");
        let updated_at = after.last_updated.unwrap();
        assert!(updated_at > before);

        // Identical content is a no-op
        assert!(!cache.update(changed).await.unwrap());
        let again = cache.get(&show.key).await.unwrap();
        assert_eq!(again.last_updated.unwrap(), updated_at);
    }

    #[tokio::test]
    async fn test_update_unknown_key() {
        let cache = RecordCache::new();
        let show = fixtures::record("https://eztvx.to/shows/1/nope/", "Nope");
        let result = cache.update(show).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_is_stale() {
        let cache = RecordCache::new();
        assert!(cache.is_stale(Duration::hours(4)).await);

        cache.mark_refreshed().await;
        assert!(!cache.is_stale(Duration::hours(4)).await);

        let old = CacheSnapshot {
            last_refreshed: Some(Utc::now() - Duration::hours(5)),
            records: BTreeMap::new(),
        };
        let cache = RecordCache::from_snapshot(old);
        assert!(cache.is_stale(Duration::hours(4)).await);
    }

    #[tokio::test]
    async fn test_missing_external_ids_and_resolved() {
        let cache = RecordCache::new();
        cache
            .add(fixtures::resolved_record(
                "https://eztvx.to/shows/2583/breaking-bad/",
                "Breaking Bad",
                "tt0903747",
            ))
            .await;
        cache
            .add(fixtures::record("https://eztvx.to/shows/481/game-of-thrones/", "Game of Thrones"))
            .await;

        let missing = cache.missing_external_ids().await;
        assert_eq!(missing, vec!["https://eztvx.to/shows/481/game-of-thrones/".to_string()]);

        let resolved = cache.resolved().await;
        assert_eq!(resolved.len(), 1);
        assert_eq!(
            resolved[0].external_id,
            Some(ExternalId::parse("tt0903747").unwrap())
        );
    }

    #[tokio::test]
    async fn test_successful_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("data").join("eztv.json");

        let cache = RecordCache::new();
        for show in fixtures::records() {
            cache.add(show).await;
        }
        cache.mark_refreshed().await;

        cache.save(&path).await.unwrap();
        assert!(path.exists());

        let loaded = RecordCache::load(&path).await;
        assert_eq!(loaded.snapshot().await, cache.snapshot().await);
        assert_eq!(loaded.last_refreshed().await, cache.last_refreshed().await);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::load(&temp_dir.path().join("eztv.json")).await;

        assert!(cache.is_empty().await);
        assert_ne!(cache.last_refreshed().await, Some(fixed_timestamp()));
    }

    #[tokio::test]
    async fn test_load_corrupt_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("eztv.json");

        tokio::fs::write(&path, b"\"Hello\"").await.unwrap();
        let cache = RecordCache::load(&path).await;
        assert!(cache.is_empty().await);
        assert_ne!(cache.last_refreshed().await, Some(fixed_timestamp()));

        tokio::fs::write(&path, b"{not json").await.unwrap();
        let cache = RecordCache::load(&path).await;
        assert!(cache.is_empty().await);
    }
}
