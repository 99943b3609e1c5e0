//! Whole-file snapshot writes shared by the record cache and the checkpoint.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `bytes` to `path` through a temporary sibling file and a rename,
/// creating parent directories as needed.
///
/// Temporary names are unique per write, so concurrent writers never clobber
/// each other's half-written file.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(format!(
        ".{}.{}.tmp",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_atomic_creates_parents_and_replaces() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("state.json");

        write_atomic(&path, b"first").await.unwrap();
        write_atomic(&path, b"second").await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"second");

        // Nothing but the snapshot is left in the directory
        let mut entries = tokio::fs::read_dir(path.parent().unwrap()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name());
        }
        assert_eq!(names, vec![OsString::from("state.json")]);
    }

    #[test]
    fn test_temp_path_is_unique_sibling() {
        let a = temp_path(Path::new("/data/eztv.json"));
        let b = temp_path(Path::new("/data/eztv.json"));
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(Path::new("/data")));
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("eztv.json."));
        assert!(name.ends_with(".tmp"));
    }

    #[tokio::test]
    async fn test_concurrent_writes_do_not_fail() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("state.json");

        let (a, b) = tokio::join!(write_atomic(&path, b"a"), write_atomic(&path, b"b"));
        a.unwrap();
        b.unwrap();
        let body = tokio::fs::read(&path).await.unwrap();
        assert!(body == b"a" || body == b"b");
    }
}
