use chrono::{DateTime, Utc};
use std::time::Duration;

/// A single stored value plus the metadata needed for TTL expiry, LRU
/// eviction, and group/dependency invalidation.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    /// Possibly gzip-compressed bytes; see `crate::compression`.
    pub value: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
    pub groups: Vec<String>,
    pub dependencies: Vec<String>,
    pub last_accessed: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero());
        now >= self.created_at + ttl
    }
}
