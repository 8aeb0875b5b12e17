//! Represents an object (file) moving through the gateway.

use super::key::StorageKey;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::{fmt, io};

/// Fallback MIME type when none is declared and the extension is unknown.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// An object as read back from the store.
///
/// Nothing here outlives the request; the object store is the only system
/// of record.
#[derive(Clone, Debug)]
pub struct StoredObject {
    /// Key the object was stored under.
    pub key: StorageKey,

    /// Full payload.
    pub content: Bytes,

    /// MIME type recorded at upload time.
    pub content_type: String,

    /// Payload size in bytes.
    pub content_length: u64,

    /// Entity tag reported by the backend, if any.
    pub etag: Option<String>,

    /// Last write time reported by the backend, if any.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Upload payload handed to an [`ObjectStoreClient`](crate::services::object_store::ObjectStoreClient).
pub enum ObjectBody {
    /// Whole payload already in memory; length is known up front.
    Buffered(Bytes),

    /// Payload arriving chunk by chunk. `declared_length` is the
    /// `Content-Length` the client announced, when it announced one.
    Streaming {
        stream: BoxStream<'static, io::Result<Bytes>>,
        declared_length: Option<u64>,
    },
}

impl ObjectBody {
    pub fn known_length(&self) -> Option<u64> {
        match self {
            ObjectBody::Buffered(bytes) => Some(bytes.len() as u64),
            ObjectBody::Streaming {
                declared_length, ..
            } => *declared_length,
        }
    }
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectBody::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            ObjectBody::Streaming {
                declared_length, ..
            } => f
                .debug_struct("Streaming")
                .field("declared_length", declared_length)
                .finish_non_exhaustive(),
        }
    }
}

/// Resolve the MIME type for an upload: the declared one wins, otherwise
/// guess from the key's extension.
pub fn resolve_content_type(declared: Option<&str>, key: &StorageKey) -> String {
    match declared.map(str::trim).filter(|ct| !ct.is_empty()) {
        Some(ct) => ct.to_string(),
        None => mime_guess::from_path(key.file_name())
            .first_raw()
            .unwrap_or(OCTET_STREAM)
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_content_type_wins() {
        let key = StorageKey::parse("a/report.ttl").unwrap();
        assert_eq!(
            resolve_content_type(Some("application/json"), &key),
            "application/json"
        );
    }

    #[test]
    fn content_type_is_inferred_from_extension() {
        let key = StorageKey::parse("a/report.ttl").unwrap();
        assert_eq!(resolve_content_type(None, &key), "text/turtle");

        let key = StorageKey::parse("a/page.html").unwrap();
        assert_eq!(resolve_content_type(Some("  "), &key), "text/html");
    }

    #[test]
    fn unknown_extension_falls_back_to_octet_stream() {
        let key = StorageKey::parse("a/blob").unwrap();
        assert_eq!(resolve_content_type(None, &key), OCTET_STREAM);
    }

    #[test]
    fn buffered_body_knows_its_length() {
        let body = ObjectBody::Buffered(Bytes::from_static(b"hello"));
        assert_eq!(body.known_length(), Some(5));
    }
}
