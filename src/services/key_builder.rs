//! Deterministic storage-key derivation. No backend calls happen here.

use crate::models::key::{KeyError, StorageKey, validate_segment};
use chrono::{Local, NaiveDate};

/// Extension appended by the legacy filename route.
pub const LEGACY_EXTENSION: &str = "ttl";

/// Join caller-supplied path segments into a key.
///
/// Segments are kept in order and separated by `/`. Fails when there are no
/// segments or when any segment is empty, `.`, `..` or contains a separator.
pub fn from_path<S: AsRef<str>>(segments: &[S]) -> Result<StorageKey, KeyError> {
    if segments.is_empty() {
        return Err(KeyError::Empty);
    }
    for segment in segments {
        validate_segment(segment.as_ref())?;
    }
    let joined = segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("/");
    StorageKey::parse(joined)
}

/// Split a raw `a/b/c` request path and build a key from its segments.
pub fn from_request_path(path: &str) -> Result<StorageKey, KeyError> {
    let segments: Vec<&str> = path.split('/').collect();
    from_path(&segments)
}

/// Legacy naming: `{today}/{filename}.{extension}`, using the server's
/// local calendar date.
///
/// Only kept for older upload clients that post a bare filename.
pub fn from_filename(filename: &str, extension: &str) -> Result<StorageKey, KeyError> {
    from_filename_on(Local::now().date_naive(), filename, extension)
}

pub fn from_filename_on(
    date: NaiveDate,
    filename: &str,
    extension: &str,
) -> Result<StorageKey, KeyError> {
    validate_segment(filename)?;
    validate_segment(extension)?;
    StorageKey::parse(format!(
        "{}/{}.{}",
        date.format("%Y-%m-%d"),
        filename,
        extension
    ))
}
