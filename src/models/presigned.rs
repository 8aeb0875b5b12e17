//! Time-limited download links.

use super::key::StorageKey;
use chrono::{DateTime, Utc};
use std::{fmt, time::Duration};

/// Every issued URL is valid for thirty minutes.
pub const PRESIGN_TTL: Duration = Duration::from_secs(30 * 60);

/// A signed GET URL for one key.
///
/// Never stored; a fresh one is signed on every request and the backend
/// verifies the embedded signature and expiry on its own.
#[derive(Clone, Debug)]
pub struct PresignedUrl {
    pub key: StorageKey,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl PresignedUrl {
    pub fn new(key: StorageKey, url: String, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        Self {
            key,
            url,
            expires_at: Utc::now() + ttl,
        }
    }
}

impl fmt::Display for PresignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
