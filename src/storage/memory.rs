//! In-process object storage for local runs and tests

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Bucket, ObjectStorage, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<(Bucket, String), StoredObject>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bucket: Bucket, key: &str) -> Option<StoredObject> {
        self.lock().get(&(bucket, key.to_string())).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(Bucket, String), StoredObject>> {
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.lock().insert(
            (bucket, key.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StorageError> {
        self.lock().remove(&(bucket, key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buckets_are_separate() {
        let storage = MemoryStorage::new();
        storage
            .put(Bucket::Original, "k.jpg", vec![1, 2], "image/jpeg")
            .await
            .unwrap();

        assert!(storage.get(Bucket::Original, "k.jpg").is_some());
        assert!(storage.get(Bucket::Blurred, "k.jpg").is_none());

        storage.delete(Bucket::Original, "k.jpg").await.unwrap();
        storage.delete(Bucket::Original, "k.jpg").await.unwrap();
        assert!(storage.is_empty());
    }
}
