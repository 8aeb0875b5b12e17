//! src/services/storage_service.rs
//!
//! StorageService — the gateway core. Turns one request into key derivation
//! plus one backend call, and hands back either a presigned download URL or
//! the stored object. Holds no state of its own besides the shared,
//! read-only object store client; the backend arbitrates concurrent writers.

use super::{
    key_builder::{self, LEGACY_EXTENSION},
    object_store::{ObjectStoreClient, StoreResult},
};
use crate::{
    errors::GatewayError,
    models::{
        key::StorageKey,
        object::{ObjectBody, StoredObject, resolve_content_type},
        presigned::{PRESIGN_TTL, PresignedUrl},
    },
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::{io, sync::Arc};
use tracing::{debug, info, warn};

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Shared by every handler through axum state; cloning is cheap.
#[derive(Clone)]
pub struct StorageService {
    store: Arc<dyn ObjectStoreClient>,
}

impl StorageService {
    pub fn new(store: Arc<dyn ObjectStoreClient>) -> Self {
        Self { store }
    }

    /// Legacy upload: `POST store/{filename}`.
    ///
    /// The key is `{today}/{filename}.ttl`. The whole body is already in
    /// memory; when the client declared a length it has to match what
    /// actually arrived.
    pub async fn upload_by_filename(
        &self,
        filename: &str,
        body: Bytes,
        declared_type: Option<&str>,
        declared_length: Option<u64>,
    ) -> GatewayResult<PresignedUrl> {
        let key = key_builder::from_filename(filename, LEGACY_EXTENSION)?;
        if let Some(expected) = declared_length {
            if expected != body.len() as u64 {
                return Err(GatewayError::BadRequest(format!(
                    "content-length {} does not match received {} bytes",
                    expected,
                    body.len()
                )));
            }
        }

        let content_type = resolve_content_type(declared_type, &key);
        let key = self
            .store
            .put_object(&key, ObjectBody::Buffered(body), &content_type)
            .await?;
        info!(%key, %content_type, "stored object at legacy location");

        self.sign(&key).await
    }

    /// `PUT store/{path...}`: stream the body to the backend under the
    /// caller's path without buffering it.
    pub async fn upload_by_path<S>(
        &self,
        path: &str,
        body: S,
        declared_type: Option<&str>,
        declared_length: Option<u64>,
    ) -> GatewayResult<PresignedUrl>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let key = key_builder::from_request_path(path)?;
        let content_type = resolve_content_type(declared_type, &key);
        let body = ObjectBody::Streaming {
            stream: body.boxed(),
            declared_length,
        };
        debug!(%key, length = ?body.known_length(), "forwarding upload");

        let key = self
            .store
            .put_object(&key, body, &content_type)
            .await
            .inspect_err(|err| warn!(%key, error = %err, "upload rejected"))?;
        info!(%key, %content_type, "stored object");

        self.sign(&key).await
    }

    /// `GET signed/{path...}`: sign a download URL, whether or not the
    /// object exists yet.
    pub async fn presigned_url(&self, path: &str) -> GatewayResult<PresignedUrl> {
        let key = key_builder::from_request_path(path)?;
        self.sign(&key).await
    }

    /// `GET store/{path...}`: fetch the object for download.
    pub async fn download(&self, path: &str) -> GatewayResult<StoredObject> {
        let key = key_builder::from_request_path(path)?;
        let object = self.store.get_object(&key).await?;
        debug!(%key, bytes = object.content_length, "serving object");
        Ok(object)
    }

    /// Readiness: can the configured bucket be reached right now?
    pub async fn ready(&self) -> StoreResult<bool> {
        self.store.bucket_reachable().await
    }

    async fn sign(&self, key: &StorageKey) -> GatewayResult<PresignedUrl> {
        let url = self.store.presign(key, PRESIGN_TTL).await?;
        debug!(key = %url.key, expires_at = %url.expires_at, "issued presigned url");
        Ok(url)
    }
}
