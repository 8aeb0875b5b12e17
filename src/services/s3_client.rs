//! S3-compatible object store client (AWS S3, MinIO, R2, ...).
//!
//! Built on `rust-s3` with path-style addressing. The crate is compiled
//! without `fail-on-err`, so non-2xx answers come back as responses and are
//! translated into [`StoreError`] here, keeping the backend's own status and
//! error code.

use super::object_store::{ObjectStoreClient, StoreError, StoreResult};
use crate::{
    config::S3Config,
    models::{
        key::StorageKey,
        object::{OCTET_STREAM, ObjectBody, StoredObject},
        presigned::PresignedUrl,
    },
};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use s3::{
    Bucket, BucketConfiguration, Region, bucket::CHUNK_SIZE, creds::Credentials, error::S3Error,
};
use std::{io, time::Duration};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

/// Process-wide handle on the configured bucket.
///
/// Built once at startup and only read afterwards; `rust-s3` buckets are
/// safe to share across tasks.
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    /// Bytes per multipart part; also the most a streamed upload holds in
    /// memory at once.
    part_size: usize,
}

impl S3ObjectStore {
    /// Build the client without touching the network.
    pub fn new(cfg: &S3Config) -> anyhow::Result<Self> {
        let region = region_for(cfg)?;
        let credentials = credentials_for(cfg)?;
        let bucket = Bucket::new(&cfg.bucket, region.clone(), credentials.clone())
            .with_context(|| format!("configuring bucket `{}`", cfg.bucket))?
            .with_path_style();

        Ok(Self {
            bucket,
            region,
            credentials,
            part_size: CHUNK_SIZE,
        })
    }

    #[cfg(test)]
    fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size;
        self
    }

    /// Build the client and provision the configured bucket.
    pub async fn connect(cfg: &S3Config) -> anyhow::Result<Self> {
        let store = Self::new(cfg)?;
        store
            .ensure_bucket(&cfg.bucket)
            .await
            .with_context(|| format!("provisioning bucket `{}`", cfg.bucket))?;
        Ok(store)
    }

    /// Forward a streamed body one part at a time.
    ///
    /// A body shorter than one part goes out as a single PUT. Anything
    /// larger becomes a multipart upload that never holds more than one
    /// part in memory, and is aborted when the body or the backend fails.
    async fn put_stream<R>(
        &self,
        key: &StorageKey,
        reader: &mut R,
        content_type: &str,
    ) -> StoreResult<()>
    where
        R: AsyncRead + Unpin,
    {
        let first = read_part(reader, self.part_size).await.map_err(body_error)?;
        if first.len() < self.part_size {
            let response = self
                .bucket
                .put_object_with_content_type(key.as_str(), &first, content_type)
                .await
                .map_err(map_s3_error)?;
            return check_status(response.status_code(), response.bytes(), None);
        }

        let upload = self
            .bucket
            .initiate_multipart_upload(key.as_str(), content_type)
            .await
            .map_err(map_s3_error)?;
        debug!(%key, upload_id = %upload.upload_id, "multipart upload started");

        let result = self
            .put_parts(key, &upload.upload_id, first, reader, content_type)
            .await;
        if let Err(err) = &result {
            warn!(%key, upload_id = %upload.upload_id, error = %err, "aborting multipart upload");
            // A part rejected by the backend has already been aborted by rust-s3.
            if let Err(abort_err) = self
                .bucket
                .abort_upload(key.as_str(), &upload.upload_id)
                .await
            {
                debug!(%key, error = %abort_err, "abort not acknowledged");
            }
        }
        result
    }

    async fn put_parts<R>(
        &self,
        key: &StorageKey,
        upload_id: &str,
        first: Vec<u8>,
        reader: &mut R,
        content_type: &str,
    ) -> StoreResult<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut parts = Vec::new();
        let mut chunk = first;
        loop {
            let last = chunk.len() < self.part_size;
            if !chunk.is_empty() {
                let part_number = parts.len() as u32 + 1;
                let part = self
                    .bucket
                    .put_multipart_chunk(chunk, key.as_str(), part_number, upload_id, content_type)
                    .await
                    .map_err(map_s3_error)?;
                parts.push(part);
            }
            if last {
                break;
            }
            chunk = read_part(reader, self.part_size).await.map_err(body_error)?;
        }

        debug!(%key, parts = parts.len(), "completing multipart upload");
        let response = self
            .bucket
            .complete_multipart_upload(key.as_str(), upload_id, parts)
            .await
            .map_err(map_s3_error)?;
        check_status(response.status_code(), response.as_slice(), None)
    }
}

/// Read up to `limit` bytes; shorter only at end of body.
async fn read_part<R>(reader: &mut R, limit: usize) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut part = Vec::with_capacity(limit);
    reader.take(limit as u64).read_to_end(&mut part).await?;
    Ok(part)
}

fn body_error(err: io::Error) -> StoreError {
    StoreError::Transport(format!("reading upload body: {}", err))
}

/// `HEAD` on the bucket itself. Unlike ListBuckets this works with
/// credentials scoped to the one bucket.
async fn head_bucket(bucket: &Bucket) -> StoreResult<bool> {
    let (_, status) = bucket.head_object("/").await.map_err(map_s3_error)?;
    match status {
        200..=299 => Ok(true),
        404 => Ok(false),
        status => Err(rejection(status, "", None)),
    }
}

/// Use the explicit endpoint when one is configured (MinIO and friends),
/// otherwise resolve the AWS region by name.
fn region_for(cfg: &S3Config) -> anyhow::Result<Region> {
    if cfg.endpoint.is_empty() {
        cfg.region
            .parse::<Region>()
            .map_err(|err| anyhow!("invalid S3 region `{}`: {}", cfg.region, err))
    } else {
        Ok(Region::Custom {
            region: cfg.region.clone(),
            endpoint: cfg.endpoint.clone(),
        })
    }
}

/// Static credentials when both keys are set, otherwise the default
/// environment / profile / instance-metadata chain.
fn credentials_for(cfg: &S3Config) -> anyhow::Result<Credentials> {
    if cfg.has_static_credentials() {
        Credentials::new(
            Some(&cfg.access_key),
            Some(&cfg.secret_key),
            None,
            None,
            None,
        )
        .context("building static S3 credentials")
    } else {
        Credentials::default().context("resolving S3 credentials from the environment")
    }
}

fn map_s3_error(err: S3Error) -> StoreError {
    match err {
        S3Error::HttpFailWithBody(status, body) => rejection(status, &body, None),
        other => StoreError::Transport(other.to_string()),
    }
}

/// Pass 2xx through; turn anything else into the matching [`StoreError`].
fn check_status(status: u16, body: &[u8], key: Option<&StorageKey>) -> StoreResult<()> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    Err(rejection(status, &String::from_utf8_lossy(body), key))
}

fn rejection(status: u16, body: &str, key: Option<&StorageKey>) -> StoreError {
    let code = xml_field(body, "Code")
        .or_else(|| {
            StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "Unknown".to_string());

    if let Some(key) = key {
        if status == 404 && matches!(code.as_str(), "NoSuchKey" | "Not Found") {
            return StoreError::NotFound(key.clone());
        }
    }

    let message = xml_field(body, "Message").unwrap_or_else(|| body.trim().to_string());
    StoreError::BackendRejected {
        status,
        code,
        message,
    }
}

/// Pull the text of `<tag>...</tag>` out of an S3 error document.
fn xml_field(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(xml_unescape(&body[start..end]))
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[async_trait]
impl ObjectStoreClient for S3ObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> StoreResult<()> {
        let handle = Bucket::new(bucket, self.region.clone(), self.credentials.clone())
            .map_err(|err| StoreError::BackendUnavailable(err.to_string()))?
            .with_path_style();

        let exists = head_bucket(&handle).await.map_err(|err| match err {
            StoreError::Transport(msg) => StoreError::BackendUnavailable(msg),
            other => other,
        })?;
        if exists {
            debug!(bucket, "bucket already present");
            return Ok(());
        }

        let response = Bucket::create_with_path_style(
            bucket,
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await
        .map_err(|err| StoreError::BackendUnavailable(err.to_string()))?;

        match response.response_code {
            200..=299 => {
                info!(bucket, "created bucket");
                Ok(())
            }
            // BucketAlreadyOwnedByYou / BucketAlreadyExists: someone beat us to it.
            409 => {
                debug!(bucket, "bucket created concurrently");
                Ok(())
            }
            status => Err(rejection(status, &response.response_text, None)),
        }
    }

    async fn bucket_reachable(&self) -> StoreResult<bool> {
        head_bucket(&self.bucket).await
    }

    async fn put_object(
        &self,
        key: &StorageKey,
        body: ObjectBody,
        content_type: &str,
    ) -> StoreResult<StorageKey> {
        match body {
            ObjectBody::Buffered(bytes) => {
                let response = self
                    .bucket
                    .put_object_with_content_type(key.as_str(), &bytes, content_type)
                    .await
                    .map_err(map_s3_error)?;
                check_status(response.status_code(), response.bytes(), None)?;
            }
            ObjectBody::Streaming {
                stream,
                declared_length,
            } => {
                debug!(%key, ?declared_length, "streaming upload");
                let mut reader = StreamReader::new(stream);
                self.put_stream(key, &mut reader, content_type).await?;
            }
        }
        Ok(key.clone())
    }

    async fn get_object(&self, key: &StorageKey) -> StoreResult<StoredObject> {
        let response = self
            .bucket
            .get_object(key.as_str())
            .await
            .map_err(map_s3_error)?;
        check_status(response.status_code(), response.bytes(), Some(key)).inspect_err(|err| {
            if !matches!(err, StoreError::NotFound(_)) {
                warn!(%key, error = %err, "backend refused download");
            }
        })?;

        let headers = response.headers();
        let content_type = headers
            .get("content-type")
            .cloned()
            .unwrap_or_else(|| OCTET_STREAM.to_string());
        let etag = headers
            .get("etag")
            .map(|tag| tag.trim_matches('"').to_string());
        let last_modified = headers
            .get("last-modified")
            .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
            .map(|date| date.with_timezone(&Utc));
        let content = response.bytes().clone();

        Ok(StoredObject {
            key: key.clone(),
            content_length: content.len() as u64,
            content,
            content_type,
            etag,
            last_modified,
        })
    }

    async fn presign(&self, key: &StorageKey, ttl: Duration) -> StoreResult<PresignedUrl> {
        let expiry_secs = u32::try_from(ttl.as_secs()).unwrap_or(u32::MAX);
        let url = self
            .bucket
            .presign_get(key.as_str(), expiry_secs, None)
            .await
            .map_err(map_s3_error)?;
        Ok(PresignedUrl::new(key.clone(), url, ttl))
    }
}
