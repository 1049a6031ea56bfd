use crate::entry::CacheEntry;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheBackendError {
    #[error("cache backend unreachable")]
    Unreachable,
}

/// Storage seam for [`crate::ResponseCache`]. The in-memory implementation
/// never errors; the trait exists so "backend unreachable" (§4.2's Failure
/// clause) is a real, testable code path rather than an assumption.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheBackendError>;
    fn set(&self, key: String, entry: CacheEntry) -> Result<(), CacheBackendError>;
    fn remove(&self, key: &str) -> Result<Option<CacheEntry>, CacheBackendError>;
    fn touch(&self, key: &str, now: DateTime<Utc>) -> Result<(), CacheBackendError>;
    fn len(&self) -> Result<usize, CacheBackendError>;
    fn remove_by_group(&self, group: &str) -> Result<Vec<String>, CacheBackendError>;
    fn remove_dependents(&self, removed_keys: &[String]) -> Result<Vec<String>, CacheBackendError>;
    fn remove_least_recently_used(&self) -> Result<Option<String>, CacheBackendError>;
}

/// The only production backend in this gateway: a `std::sync::Mutex`-guarded
/// `HashMap`, never held across an `.await` point (every method here is
/// synchronous). Persistence is an explicit non-goal (§1).
#[derive(Default)]
pub struct InMemoryBackend {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for InMemoryBackend {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheBackendError> {
        let guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: String, entry: CacheEntry) -> Result<(), CacheBackendError> {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(key, entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<Option<CacheEntry>, CacheBackendError> {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.remove(key))
    }

    fn touch(&self, key: &str, now: DateTime<Utc>) -> Result<(), CacheBackendError> {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = guard.get_mut(key) {
            entry.last_accessed = now;
        }
        Ok(())
    }

    fn len(&self) -> Result<usize, CacheBackendError> {
        let guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.len())
    }

    fn remove_by_group(&self, group: &str) -> Result<Vec<String>, CacheBackendError> {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let keys: Vec<String> = guard
            .iter()
            .filter(|(_, entry)| entry.groups.iter().any(|g| g == group))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            guard.remove(key);
        }
        Ok(keys)
    }

    fn remove_dependents(&self, removed_keys: &[String]) -> Result<Vec<String>, CacheBackendError> {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let dependents: Vec<String> = guard
            .iter()
            .filter(|(_, entry)| entry.dependencies.iter().any(|d| removed_keys.contains(d)))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &dependents {
            guard.remove(key);
        }
        Ok(dependents)
    }

    fn remove_least_recently_used(&self) -> Result<Option<String>, CacheBackendError> {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let oldest = guard.iter().min_by_key(|(_, entry)| entry.last_accessed).map(|(k, _)| k.clone());
        if let Some(key) = &oldest {
            guard.remove(key);
        }
        Ok(oldest)
    }
}

/// Test-only backend that simulates a fully unreachable store, used to
/// exercise the "never raises, reports failure" contract in §4.2.
#[cfg(test)]
pub struct AlwaysDownBackend;

#[cfg(test)]
impl CacheBackend for AlwaysDownBackend {
    fn get(&self, _key: &str) -> Result<Option<CacheEntry>, CacheBackendError> {
        Err(CacheBackendError::Unreachable)
    }
    fn set(&self, _key: String, _entry: CacheEntry) -> Result<(), CacheBackendError> {
        Err(CacheBackendError::Unreachable)
    }
    fn remove(&self, _key: &str) -> Result<Option<CacheEntry>, CacheBackendError> {
        Err(CacheBackendError::Unreachable)
    }
    fn touch(&self, _key: &str, _now: DateTime<Utc>) -> Result<(), CacheBackendError> {
        Err(CacheBackendError::Unreachable)
    }
    fn len(&self) -> Result<usize, CacheBackendError> {
        Err(CacheBackendError::Unreachable)
    }
    fn remove_by_group(&self, _group: &str) -> Result<Vec<String>, CacheBackendError> {
        Err(CacheBackendError::Unreachable)
    }
    fn remove_dependents(&self, _removed_keys: &[String]) -> Result<Vec<String>, CacheBackendError> {
        Err(CacheBackendError::Unreachable)
    }
    fn remove_least_recently_used(&self) -> Result<Option<String>, CacheBackendError> {
        Err(CacheBackendError::Unreachable)
    }
}
