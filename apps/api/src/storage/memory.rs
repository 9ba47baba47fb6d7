use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{BlobMeta, BlobStore, StoreError};

/// Process-local blob store. Keys are kept ordered so listings match S3's lexical order.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<String, (Bytes, DateTime<Utc>)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, (Bytes, DateTime<Utc>)>>, StoreError>
    {
        self.objects
            .lock()
            .map_err(|_| StoreError::Backend("blob store lock poisoned".to_string()))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), (body, Utc::now()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.lock()?.get(key).map(|(body, _)| body.clone()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobMeta>, StoreError> {
        Ok(self
            .lock()?
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, (body, modified))| BlobMeta {
                key: key.clone(),
                size_bytes: body.len() as u64,
                last_modified: *modified,
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut objects = self.lock()?;
        let before = objects.len();
        objects.retain(|key, _| !key.starts_with(prefix));
        Ok(before - objects.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_is_scoped_to_prefix() {
        let store = MemoryBlobStore::new();
        store.put("a/1", Bytes::from_static(b"x"), "text/plain").await.unwrap();
        store.put("a/2", Bytes::from_static(b"yy"), "text/plain").await.unwrap();
        store.put("ab/3", Bytes::from_static(b"z"), "text/plain").await.unwrap();

        let listed = store.list("a/").await.unwrap();
        let keys: Vec<_> = listed.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["a/1", "a/2"]);
        assert_eq!(listed[1].size_bytes, 2);
    }

    #[tokio::test]
    async fn test_delete_prefix_counts_removed_objects() {
        let store = MemoryBlobStore::new();
        store.put("a/1", Bytes::from_static(b"x"), "text/plain").await.unwrap();
        store.put("a/2", Bytes::from_static(b"y"), "text/plain").await.unwrap();
        store.put("b/1", Bytes::from_static(b"z"), "text/plain").await.unwrap();

        assert_eq!(store.delete_prefix("a/").await.unwrap(), 2);
        assert!(store.get("a/1").await.unwrap().is_none());
        assert!(store.get("b/1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_single_key() {
        let store = MemoryBlobStore::new();
        store.put("a/1", Bytes::from_static(b"x"), "text/plain").await.unwrap();
        store.put("a/10", Bytes::from_static(b"y"), "text/plain").await.unwrap();

        assert!(store.delete("a/1").await.unwrap());
        assert!(!store.delete("a/1").await.unwrap());
        assert!(store.get("a/10").await.unwrap().is_some());
    }
}
