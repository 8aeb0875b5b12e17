//! In-memory `ObjectStoreClient` used by the test suite.

use super::object_store::{ObjectStoreClient, StoreError, StoreResult};
use crate::models::{
    key::StorageKey,
    object::{ObjectBody, StoredObject},
    presigned::PresignedUrl,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{SubsecRound, Utc};
use futures::StreamExt;
use std::{collections::HashMap, time::Duration};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    bucket: String,
    objects: RwLock<HashMap<StorageKey, StoredObject>>,
    buckets: RwLock<Vec<String>>,
    rejection: Option<(u16, String, String)>,
    unreachable: bool,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    /// Make every data operation fail the way a backend refusal would.
    pub fn rejecting(mut self, status: u16, code: &str, message: &str) -> Self {
        self.rejection = Some((status, code.to_string(), message.to_string()));
        self
    }

    /// Make every call fail as if the backend could not be reached.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn has_bucket(&self, name: &str) -> bool {
        self.buckets.read().await.iter().any(|b| b == name)
    }

    fn check(&self) -> StoreResult<()> {
        if self.unreachable {
            return Err(StoreError::Transport("connection refused".into()));
        }
        if let Some((status, code, message)) = &self.rejection {
            return Err(StoreError::BackendRejected {
                status: *status,
                code: code.clone(),
                message: message.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStoreClient for MemoryStore {
    async fn ensure_bucket(&self, bucket: &str) -> StoreResult<()> {
        if self.unreachable {
            return Err(StoreError::BackendUnavailable("connection refused".into()));
        }
        let mut buckets = self.buckets.write().await;
        if !buckets.iter().any(|b| b == bucket) {
            buckets.push(bucket.to_string());
        }
        Ok(())
    }

    async fn bucket_reachable(&self) -> StoreResult<bool> {
        if self.unreachable {
            return Err(StoreError::Transport("connection refused".into()));
        }
        Ok(self.has_bucket(&self.bucket).await)
    }

    async fn put_object(
        &self,
        key: &StorageKey,
        body: ObjectBody,
        content_type: &str,
    ) -> StoreResult<StorageKey> {
        self.check()?;
        let content = match body {
            ObjectBody::Buffered(bytes) => bytes,
            ObjectBody::Streaming { mut stream, .. } => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|err| StoreError::Transport(err.to_string()))?;
                    buf.extend_from_slice(&chunk);
                }
                buf.freeze()
            }
        };

        let object = StoredObject {
            key: key.clone(),
            content_length: content.len() as u64,
            etag: Some(format!("{:016x}", fingerprint(&content))),
            content,
            content_type: content_type.to_string(),
            last_modified: Some(Utc::now().trunc_subsecs(0)),
        };
        // Whole-object swap under the write lock: last writer wins.
        self.objects.write().await.insert(key.clone(), object);
        Ok(key.clone())
    }

    async fn get_object(&self, key: &StorageKey) -> StoreResult<StoredObject> {
        self.check()?;
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn presign(&self, key: &StorageKey, ttl: Duration) -> StoreResult<PresignedUrl> {
        let url = format!(
            "memory://{}/{}?X-Amz-Expires={}",
            self.bucket,
            key,
            ttl.as_secs()
        );
        Ok(PresignedUrl::new(key.clone(), url, ttl))
    }
}

fn fingerprint(content: &Bytes) -> u64 {
    use std::hash::{DefaultHasher, Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_bucket_is_idempotent() {
        let store = MemoryStore::new("b");
        store.ensure_bucket("b").await.unwrap();
        store.ensure_bucket("b").await.unwrap();
        assert!(store.bucket_reachable().await.unwrap());
        assert_eq!(store.buckets.read().await.len(), 1);
    }

    #[tokio::test]
    async fn streamed_and_buffered_bodies_store_the_same_bytes() {
        let store = MemoryStore::new("b");
        let key = StorageKey::parse("k").unwrap();

        let chunks = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"hel")),
            Ok(Bytes::from_static(b"lo")),
        ])
        .boxed();
        store
            .put_object(
                &key,
                ObjectBody::Streaming {
                    stream: chunks,
                    declared_length: None,
                },
                "text/plain",
            )
            .await
            .unwrap();
        let streamed = store.get_object(&key).await.unwrap();

        store
            .put_object(&key, ObjectBody::Buffered(Bytes::from_static(b"hello")), "text/plain")
            .await
            .unwrap();
        let buffered = store.get_object(&key).await.unwrap();

        assert_eq!(streamed.content, buffered.content);
        assert_eq!(streamed.etag, buffered.etag);
    }
}
