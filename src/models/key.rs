//! Storage keys: the slash-delimited names objects live under in the bucket.

use std::fmt;
use thiserror::Error;

/// S3 refuses keys longer than this many bytes.
pub const MAX_KEY_LEN: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("storage key is empty")]
    Empty,
    #[error("storage key segment `{0}` is not allowed")]
    InvalidSegment(String),
    #[error("storage key exceeds {MAX_KEY_LEN} bytes")]
    TooLong,
    #[error("storage key contains control characters")]
    ControlCharacter,
}

/// A validated object key.
///
/// A `StorageKey` is never empty and never contains a `..` segment, so it
/// cannot address anything outside the configured bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    /// Validate an already-joined key.
    pub fn parse(raw: impl Into<String>) -> Result<Self, KeyError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(KeyError::Empty);
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(KeyError::TooLong);
        }
        if raw.bytes().any(|b| b.is_ascii_control()) {
            return Err(KeyError::ControlCharacter);
        }
        for segment in raw.split('/') {
            validate_segment(segment)?;
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, used for content-type inference.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Reject segments that would make the joined key ambiguous or let it
/// climb out of the bucket namespace. `.` is rejected as well since URL
/// normalization would silently drop it from the request path.
pub(crate) fn validate_segment(segment: &str) -> Result<(), KeyError> {
    if segment.is_empty() || segment == "." || segment == ".." || segment.contains('/') {
        return Err(KeyError::InvalidSegment(segment.to_string()));
    }
    Ok(())
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
