//! The capability surface the gateway needs from an object store.
//!
//! [`ObjectStoreClient`] is the only seam between request handling and the
//! backend. The production implementation is
//! [`S3ObjectStore`](super::s3_client::S3ObjectStore); tests run against an
//! in-memory implementation.

use crate::models::{
    key::StorageKey,
    object::{ObjectBody, StoredObject},
    presigned::PresignedUrl,
};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{0}` not found")]
    NotFound(StorageKey),
    #[error("backend rejected request with {status} {code}: {message}")]
    BackendRejected {
        status: u16,
        code: String,
        message: String,
    },
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("transport error talking to backend: {0}")]
    Transport(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Object store operations used by the gateway.
///
/// Implementations are shared by every request handler at once and must be
/// safe for concurrent use. None of them retry.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Create `bucket` if it does not exist. An existing bucket is success.
    async fn ensure_bucket(&self, bucket: &str) -> StoreResult<()>;

    /// Report whether the configured bucket is reachable.
    async fn bucket_reachable(&self) -> StoreResult<bool>;

    /// Store `body` under `key`, replacing whatever was there.
    async fn put_object(
        &self,
        key: &StorageKey,
        body: ObjectBody,
        content_type: &str,
    ) -> StoreResult<StorageKey>;

    /// Read the object stored under `key`.
    async fn get_object(&self, key: &StorageKey) -> StoreResult<StoredObject>;

    /// Sign a GET URL for `key` valid for `ttl`. Pure signing: the object
    /// does not need to exist.
    async fn presign(&self, key: &StorageKey, ttl: Duration) -> StoreResult<PresignedUrl>;
}
