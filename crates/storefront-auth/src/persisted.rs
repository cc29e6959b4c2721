//! Durable key/value slots for session snapshots
//!
//! `FileStore` keeps one JSON file per key. Writes go through a temp file and
//! a rename so a crash mid-write leaves either the old or the new snapshot,
//! never a torn one. `MemoryStore` backs tests and sessions that should not
//! outlive the process.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A durable string slot addressed by key.
///
/// Uses `Pin<Box<dyn Future>>` return types so the session store can hold an
/// `Arc<dyn PersistedStore>`.
pub trait PersistedStore: Send + Sync {
    /// Read the value under `key`, `None` if the slot is empty.
    fn load<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    /// Replace the value under `key`.
    fn save<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()>;

    /// Empty the slot. Removing an empty slot is not an error.
    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Directory-backed store: `<dir>/<key>.json`, mode 0600.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if missing) the state directory.
    pub async fn open(dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::Io(format!("creating state dir {}: {e}", dir.display())))?;
        info!(dir = %dir.display(), "opened session state directory");
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl PersistedStore for FileStore {
    fn load<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            match tokio::fs::read_to_string(&path).await {
                Ok(contents) => Ok(Some(contents)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(Error::Io(format!("reading {}: {e}", path.display()))),
            }
        })
    }

    fn save<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            write_atomic(&path, value).await
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "removed persisted slot");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(Error::Io(format!("removing {}: {e}", path.display()))),
            }
        })
    }
}

/// In-process store. Contents are lost when the value is dropped.
#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a slot directly, bypassing the trait (test setup).
    pub async fn insert(&self, key: &str, value: &str) {
        self.slots
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
    }
}

impl PersistedStore for MemoryStore {
    fn load<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.slots.lock().await.get(key).cloned()) })
    }

    fn save<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.slots
                .lock()
                .await
                .insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.slots.lock().await.remove(key);
            Ok(())
        })
    }
}

/// Write `contents` to `path` via temp file + rename, permissions 0600.
async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("snapshot path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("snapshot");

    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, contents.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp snapshot file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting snapshot file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp snapshot file: {e}")))?;

    debug!(path = %path.display(), "persisted snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_roundtrip_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileStore::open(dir.path().to_path_buf()).await.unwrap();
        store.save("auth_state", r#"{"a":1}"#).await.unwrap();

        let reopened = FileStore::open(dir.path().to_path_buf()).await.unwrap();
        let value = reopened.load("auth_state").await.unwrap();
        assert_eq!(value.as_deref(), Some(r#"{"a":1}"#));
    }

    #[tokio::test]
    async fn file_store_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().to_path_buf()).await.unwrap();
        assert!(store.load("auth_state").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_creates_nested_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileStore::open(nested.clone()).await.unwrap();
        store.save("auth_state", "{}").await.unwrap();
        assert!(nested.join("auth_state.json").exists());
    }

    #[tokio::test]
    async fn file_store_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().to_path_buf()).await.unwrap();
        store.save("auth_state", "{}").await.unwrap();

        store.remove("auth_state").await.unwrap();
        store.remove("auth_state").await.unwrap();
        assert!(store.load("auth_state").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().to_path_buf()).await.unwrap();
        let result = store.save("../escape", "{}").await;
        assert!(matches!(result, Err(Error::InvalidKey(_))));
    }

    #[tokio::test]
    async fn file_store_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().to_path_buf()).await.unwrap();
        store.save("auth_state", "{}").await.unwrap();
        store.save("auth_state", "{\"b\":2}").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["auth_state.json".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_store_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().to_path_buf()).await.unwrap();
        store.save("auth_state", "{}").await.unwrap();

        let metadata = tokio::fs::metadata(dir.path().join("auth_state.json"))
            .await
            .unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "snapshot file must be 0600, got {mode:o}");
    }

    #[tokio::test]
    async fn memory_store_save_load_remove() {
        let store = MemoryStore::new();
        assert!(store.load("k").await.unwrap().is_none());

        store.save("k", "v").await.unwrap();
        assert_eq!(store.load("k").await.unwrap().as_deref(), Some("v"));

        store.remove("k").await.unwrap();
        assert!(store.load("k").await.unwrap().is_none());
    }
}
