//! Key/value storage underneath the repository.
//!
//! Values are JSON documents kept as text. The engine never depends on a
//! concrete backend: tests use [`MemoryStorage`], the command line uses
//! [`FileStorage`].

use async_trait::async_trait;
use log::debug;
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};

use crate::error::{DocumentSnafu, IoSnafu, StorageResult};

#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Returns the raw value stored under `key`, if any.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replaces the whole value stored under `key`.
    async fn set(&self, key: &str, value: String) -> StorageResult<()>;

    async fn remove(&self, key: &str) -> StorageResult<()>;

    async fn clear(&self) -> StorageResult<()>;

    async fn list_keys(&self) -> StorageResult<Vec<String>>;
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.values.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        self.values.write().await.clear();
        Ok(())
    }

    async fn list_keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.values.read().await.keys().cloned().collect())
    }
}

/// Store kept as a single JSON document on disk.
///
/// Every write rewrites the document through a temporary file and a rename, so
/// a crash leaves either the old or the new document.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> FileStorage {
        FileStorage {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> StorageResult<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => {
                serde_json::from_str(&contents).context(DocumentSnafu {
                    path: self.path_str(),
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("FileStorage: {} does not exist yet", self.path_str());
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e).context(IoSnafu {
                path: self.path_str(),
            }),
        }
    }

    async fn persist(&self, values: &BTreeMap<String, String>) -> StorageResult<()> {
        let contents = serde_json::to_string_pretty(values).context(DocumentSnafu {
            path: self.path_str(),
        })?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await.context(IoSnafu {
            path: tmp.display().to_string(),
        })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .context(IoSnafu {
                path: self.path_str(),
            })
    }
}

#[async_trait]
impl StorageAdapter for FileStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value);
        self.persist(&values).await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        if values.remove(key).is_some() {
            self.persist(&values).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        self.persist(&BTreeMap::new()).await
    }

    async fn list_keys(&self) -> StorageResult<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn exercise(store: &dyn StorageAdapter) {
        assert_eq!(store.get("a").await.unwrap(), None);
        store.set("a", "1".to_string()).await.unwrap();
        store.set("b", "[2]".to_string()).await.unwrap();
        store.set("a", "3".to_string()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("3".to_string()));
        assert_eq!(
            store.list_keys().await.unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        store.clear().await.unwrap();
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_storage() {
        exercise(&MemoryStorage::new()).await;
    }

    #[tokio::test]
    async fn file_storage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("actas.json");
        let store = FileStorage::new(&path);
        exercise(&store).await;

        // Values survive a new handle on the same file.
        store.set("k", "\"v\"".to_string()).await.unwrap();
        let other = FileStorage::new(&path);
        assert_eq!(other.get("k").await.unwrap(), Some("\"v\"".to_string()));
    }

    #[tokio::test]
    async fn file_storage_reports_broken_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("actas.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileStorage::new(&path);
        assert!(store.get("k").await.is_err());
    }
}
