//! Content-addressed response cache: namespaced, TTL'd, group/dependency
//! invalidating, with optional gzip compression above a size threshold.
//!
//! Grounded on the `CachedProvider` shape in the retrieved corpus
//! (`Mutex<HashMap<..>>` never held across an `.await`, `CacheEntry` with
//! `created_at`/`last_accessed`, LRU eviction via `min_by_key`), extended
//! with namespace/group/dependency semantics and a pluggable backend so the
//! "backing store unreachable" failure mode in §4.2 is expressible even
//! though the default backend is in-memory.

mod backend;
mod compression;
mod entry;
mod metrics;

pub use backend::{CacheBackend, CacheBackendError, InMemoryBackend};
pub use entry::CacheEntry;
pub use metrics::CacheMetrics;

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::warn;

/// Outcome of a cache read: hit with the stored bytes, a clean miss, or the
/// backend being unreachable (treated identically to a miss by callers, but
/// recorded separately in metrics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetOutcome {
    Hit(Vec<u8>),
    Miss,
    BackendUnavailable,
}

/// Outcome of a cache write. The cache never raises: a failed write is
/// reported, not propagated as an error to the caller's control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Stored,
    Failed,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub max_entries: usize,
    pub compression_threshold: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { default_ttl: Duration::from_secs(3600), max_entries: 10_000, compression_threshold: 1024 }
    }
}

/// Namespaced, TTL'd key-value cache with group/dependency invalidation.
///
/// `B` is the backend implementation; `InMemoryBackend` is the default and
/// only production backend in this gateway (the non-goal in §1 rules out
/// durable persistence), but the trait seam documents the "backend
/// unreachable" failure mode as a first-class, testable case.
pub struct ResponseCache<B: CacheBackend = InMemoryBackend> {
    backend: B,
    config: CacheConfig,
    metrics: CacheMetrics,
}

impl ResponseCache<InMemoryBackend> {
    pub fn new(config: CacheConfig) -> Self {
        Self { backend: InMemoryBackend::new(), config, metrics: CacheMetrics::default() }
    }
}

impl<B: CacheBackend> ResponseCache<B> {
    pub fn with_backend(backend: B, config: CacheConfig) -> Self {
        Self { backend, config, metrics: CacheMetrics::default() }
    }

    fn effective_key(namespace: &str, key: &str) -> String {
        format!("{namespace}:{key}")
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.clone()
    }

    /// Fetch a value. Returns `Miss` both for a genuine absence/expiry and
    /// for backend unavailability — upper layers must not distinguish them
    /// for correctness, only for observability.
    pub fn get(&self, namespace: &str, key: &str) -> GetOutcome {
        let started = std::time::Instant::now();
        let effective = Self::effective_key(namespace, key);

        let result = match self.backend.get(&effective) {
            Ok(Some(entry)) => {
                if entry.is_expired(Utc::now()) {
                    let _ = self.backend.remove(&effective);
                    self.metrics.record_miss();
                    GetOutcome::Miss
                } else {
                    let _ = self.backend.touch(&effective, Utc::now());
                    self.metrics.record_hit();
                    GetOutcome::Hit(compression::decode(&entry.value))
                }
            }
            Ok(None) => {
                self.metrics.record_miss();
                GetOutcome::Miss
            }
            Err(err) => {
                warn!(error = %err, key = %effective, "cache backend unreachable on get");
                self.metrics.record_miss();
                GetOutcome::BackendUnavailable
            }
        };

        self.metrics.record_latency(started.elapsed());
        result
    }

    /// Store a value under `(namespace, key)` with the given TTL, group
    /// tags, and dependency keys. Values larger than the configured
    /// compression threshold are transparently gzip-compressed with a
    /// one-byte marker prefix (`entry::COMPRESSED_MARKER`).
    pub fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
        groups: Vec<String>,
        dependencies: Vec<String>,
    ) -> SetOutcome {
        let effective = Self::effective_key(namespace, key);
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let stored = compression::encode(value, self.config.compression_threshold);
        let now = Utc::now();

        let entry = CacheEntry {
            key: effective.clone(),
            value: stored,
            created_at: now,
            ttl,
            groups,
            dependencies,
            last_accessed: now,
        };

        match self.backend.set(effective, entry) {
            Ok(()) => {
                self.evict_over_capacity();
                SetOutcome::Stored
            }
            Err(err) => {
                warn!(error = %err, "cache backend unreachable on set");
                SetOutcome::Failed
            }
        }
    }

    pub fn delete(&self, namespace: &str, key: &str) {
        let effective = Self::effective_key(namespace, key);
        let _ = self.backend.remove(&effective);
    }

    /// Invalidate every entry tagged with `group`, plus every entry whose
    /// dependency set intersects the removed keys (one level of transitive
    /// invalidation, per §3's cache-entry invariant). Idempotent: a second
    /// call against an already-empty group returns 0.
    pub fn invalidate_group(&self, group: &str) -> usize {
        let removed_keys = match self.backend.remove_by_group(group) {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, group, "cache backend unreachable on invalidate_group");
                return 0;
            }
        };
        if removed_keys.is_empty() {
            return 0;
        }
        let cascade = match self.backend.remove_dependents(&removed_keys) {
            Ok(keys) => keys,
            Err(_) => Vec::new(),
        };
        let count = removed_keys.len() + cascade.len();
        self.metrics.record_evictions(count as u64);
        count
    }

    pub fn mget(&self, namespace: &str, keys: &[String]) -> Vec<GetOutcome> {
        keys.iter().map(|k| self.get(namespace, k)).collect()
    }

    pub fn mset(
        &self,
        namespace: &str,
        entries: Vec<(String, Vec<u8>, Option<Duration>, Vec<String>, Vec<String>)>,
    ) -> Vec<SetOutcome> {
        entries
            .into_iter()
            .map(|(key, value, ttl, groups, deps)| self.set(namespace, &key, &value, ttl, groups, deps))
            .collect()
    }

    /// Enforce `max_entries` by evicting the least-recently-accessed entry,
    /// inline on every `set`, so the bound holds at every observable point.
    fn evict_over_capacity(&self) {
        while let Ok(len) = self.backend.len() {
            if len <= self.config.max_entries {
                break;
            }
            match self.backend.remove_least_recently_used() {
                Ok(Some(_)) => self.metrics.record_evictions(1),
                _ => break,
            }
        }
    }
}

fn fingerprint(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Derive a stable cache key from arbitrary serializable content — used by
/// callers (notably the model router) that need a deterministic fingerprint
/// rather than a caller-supplied key.
pub fn fingerprint_key(parts: &[&str]) -> String {
    fingerprint(parts.join("\u{0}").as_bytes())
}

pub fn last_access_before(entry: &CacheEntry, cutoff: DateTime<Utc>) -> bool {
    entry.last_accessed < cutoff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_returns_stored_value() {
        let cache = ResponseCache::new(CacheConfig::default());
        cache.set("ns", "k1", b"hello", None, vec![], vec![]);
        match cache.get("ns", "k1") {
            GetOutcome::Hit(v) => assert_eq!(v, b"hello"),
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn get_on_missing_key_is_a_miss() {
        let cache = ResponseCache::new(CacheConfig::default());
        assert_eq!(cache.get("ns", "absent"), GetOutcome::Miss);
    }

    #[test]
    fn ttl_expiry_evicts_entry() {
        let cache = ResponseCache::new(CacheConfig::default());
        cache.set("ns", "k1", b"hello", Some(Duration::from_millis(0)), vec![], vec![]);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(cache.get("ns", "k1"), GetOutcome::Miss);
    }

    #[test]
    fn namespaces_are_isolated() {
        let cache = ResponseCache::new(CacheConfig::default());
        cache.set("a", "k", b"one", None, vec![], vec![]);
        cache.set("b", "k", b"two", None, vec![], vec![]);
        assert_eq!(cache.get("a", "k"), GetOutcome::Hit(b"one".to_vec()));
        assert_eq!(cache.get("b", "k"), GetOutcome::Hit(b"two".to_vec()));
    }

    #[test]
    fn invalidate_group_removes_tagged_entries_and_is_idempotent() {
        let cache = ResponseCache::new(CacheConfig::default());
        cache.set("ns", "k1", b"a", None, vec!["g1".to_string()], vec![]);
        cache.set("ns", "k2", b"b", None, vec!["g1".to_string()], vec![]);
        cache.set("ns", "k3", b"c", None, vec!["g2".to_string()], vec![]);

        let removed = cache.invalidate_group("g1");
        assert_eq!(removed, 2);
        assert_eq!(cache.get("ns", "k1"), GetOutcome::Miss);
        assert_eq!(cache.get("ns", "k2"), GetOutcome::Miss);
        assert_eq!(cache.get("ns", "k3"), GetOutcome::Hit(b"c".to_vec()));

        assert_eq!(cache.invalidate_group("g1"), 0);
    }

    #[test]
    fn invalidate_group_cascades_to_dependents() {
        let cache = ResponseCache::new(CacheConfig::default());
        let ns_key = ResponseCache::<InMemoryBackend>::effective_key("ns", "base");
        cache.set("ns", "base", b"a", None, vec!["g1".to_string()], vec![]);
        cache.set("ns", "derived", b"b", None, vec![], vec![ns_key]);

        let removed = cache.invalidate_group("g1");
        assert_eq!(removed, 2);
        assert_eq!(cache.get("ns", "derived"), GetOutcome::Miss);
    }

    #[test]
    fn lru_eviction_enforces_max_entries() {
        let cache = ResponseCache::new(CacheConfig { max_entries: 2, ..CacheConfig::default() });
        cache.set("ns", "k1", b"a", None, vec![], vec![]);
        cache.set("ns", "k2", b"b", None, vec![], vec![]);
        // touch k1 so k2 becomes the least-recently-used entry
        let _ = cache.get("ns", "k1");
        cache.set("ns", "k3", b"c", None, vec![], vec![]);

        assert_eq!(cache.get("ns", "k2"), GetOutcome::Miss);
        assert!(matches!(cache.get("ns", "k1"), GetOutcome::Hit(_)));
        assert!(matches!(cache.get("ns", "k3"), GetOutcome::Hit(_)));
    }

    #[test]
    fn large_values_round_trip_through_compression() {
        let cache = ResponseCache::new(CacheConfig { compression_threshold: 16, ..CacheConfig::default() });
        let big = vec![b'x'; 4096];
        cache.set("ns", "big", &big, None, vec![], vec![]);
        match cache.get("ns", "big") {
            GetOutcome::Hit(v) => assert_eq!(v, big),
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn metrics_are_monotonically_non_decreasing() {
        let cache = ResponseCache::new(CacheConfig::default());
        cache.set("ns", "k1", b"a", None, vec![], vec![]);
        let _ = cache.get("ns", "k1");
        let _ = cache.get("ns", "absent");
        let m = cache.metrics();
        assert_eq!(m.hits(), 1);
        assert_eq!(m.misses(), 1);
    }

    #[test]
    fn fingerprint_key_is_deterministic() {
        let a = fingerprint_key(&["what is revenue", "{}"]);
        let b = fingerprint_key(&["what is revenue", "{}"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn unreachable_backend_never_raises_and_reports_failure() {
        let cache = ResponseCache::with_backend(backend::AlwaysDownBackend, CacheConfig::default());
        assert_eq!(cache.get("ns", "k"), GetOutcome::BackendUnavailable);
        assert_eq!(cache.set("ns", "k", b"v", None, vec![], vec![]), SetOutcome::Failed);
    }
}
