//! Locally cached credential record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A validated reporting key and the moment it stops being trusted locally.
///
/// Persisted as `{ "key": "...", "expires_at": "<RFC 3339>" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKey {
    pub key: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredKey {
    /// Creates a record for `key` that expires `ttl` after `now`.
    pub fn issue(key: impl Into<String>, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            expires_at: now + ttl,
        }
    }

    /// Whether the record is expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry, or `None` once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let left = self.expires_at - now;
        (left > Duration::zero()).then_some(left)
    }
}
