//! In-memory object store

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ObjectStore, StorageError, StorageResult};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// Object store keeping everything in a map
///
/// Used by tests and by `--dry-run` invocations of the CLI. Keys are kept
/// sorted so `list` output is deterministic.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Content type recorded for `key`, if stored
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.lock().get(key).map(|o| o.content_type.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredObject>> {
        // A poisoned map still holds consistent entries: every mutation is a
        // single insert or remove.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".into()));
        }
        self.lock().insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.lock()
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.lock()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn presign(&self, key: &str, ttl_secs: u64) -> StorageResult<String> {
        if !self.lock().contains_key(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!("memory://{}?ttl={}", key, ttl_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_list_delete() {
        let store = MemoryStorage::new();
        store.put("d1/a.pdf", b"a".to_vec(), "application/pdf").await.unwrap();
        store.put("d1/b.pdf", b"b".to_vec(), "application/pdf").await.unwrap();
        store.put("d2/c.pdf", b"c".to_vec(), "application/pdf").await.unwrap();

        assert_eq!(store.get("d1/b.pdf").await.unwrap(), b"b");
        assert_eq!(store.list("d1/").await.unwrap(), vec!["d1/a.pdf", "d1/b.pdf"]);
        assert_eq!(store.content_type("d2/c.pdf").as_deref(), Some("application/pdf"));

        store.delete("d1/a.pdf").await.unwrap();
        assert!(matches!(store.get("d1/a.pdf").await, Err(StorageError::NotFound(_))));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn presign_requires_existing_object() {
        let store = MemoryStorage::new();
        assert!(store.presign("missing", 60).await.is_err());
        store.put("k", vec![1], "image/png").await.unwrap();
        assert_eq!(store.presign("k", 60).await.unwrap(), "memory://k?ttl=60");
    }
}
