//! Cache backend trait and in-memory implementation.
//!
//! A backend is an opaque byte store addressed by exact key string inside a
//! named bucket. It offers no enumeration: callers can only reach keys they
//! already know.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use nscache_core::BackendError;

/// Byte-oriented cache backend.
///
/// Implementations must be thread-safe. `expires` is in seconds; `0` means
/// no expiry (or the backend's default).
pub trait CacheBackend: Send + Sync {
    /// Whether `key` exists in `bucket`.
    fn exists(&self, key: &str, bucket: &str) -> Result<bool, BackendError>;

    /// Fetch the bytes stored under `key`, or `None` if absent.
    fn get(&self, key: &str, bucket: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Store a new entry.
    fn set(&self, key: &str, value: &[u8], expires: u64, bucket: &str)
        -> Result<(), BackendError>;

    /// Replace an existing entry.
    fn update(
        &self,
        key: &str,
        value: &[u8],
        expires: u64,
        bucket: &str,
    ) -> Result<(), BackendError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str, bucket: &str) -> Result<(), BackendError>;

    /// Remove every entry in `bucket`.
    fn clear(&self, bucket: &str) -> Result<(), BackendError>;
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    deadline: Option<Instant>,
}

impl MemoryEntry {
    fn new(value: &[u8], expires: u64) -> Self {
        Self {
            value: value.to_vec(),
            deadline: (expires > 0).then(|| Instant::now() + Duration::from_secs(expires)),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.deadline.is_none_or(|deadline| now < deadline)
    }
}

type Buckets = HashMap<String, HashMap<String, MemoryEntry>>;

/// In-process backend keeping every bucket in memory.
///
/// Expired entries read as absent and are dropped on the next write to
/// their bucket.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    buckets: RwLock<Buckets>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries in `bucket`.
    pub fn entry_count(&self, bucket: &str) -> Result<usize, BackendError> {
        let now = Instant::now();
        let buckets = self
            .buckets
            .read()
            .map_err(|_| BackendError::LockPoisoned)?;
        Ok(buckets
            .get(bucket)
            .map(|entries| entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0))
    }

    fn store(
        &self,
        key: &str,
        value: &[u8],
        expires: u64,
        bucket: &str,
    ) -> Result<(), BackendError> {
        let now = Instant::now();
        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| BackendError::LockPoisoned)?;
        let entries = buckets.entry(bucket.to_string()).or_default();
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(key.to_string(), MemoryEntry::new(value, expires));
        Ok(())
    }
}

impl CacheBackend for MemoryBackend {
    fn exists(&self, key: &str, bucket: &str) -> Result<bool, BackendError> {
        Ok(self.get(key, bucket)?.is_some())
    }

    fn get(&self, key: &str, bucket: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let now = Instant::now();
        let buckets = self
            .buckets
            .read()
            .map_err(|_| BackendError::LockPoisoned)?;
        Ok(buckets
            .get(bucket)
            .and_then(|entries| entries.get(key))
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    fn set(
        &self,
        key: &str,
        value: &[u8],
        expires: u64,
        bucket: &str,
    ) -> Result<(), BackendError> {
        self.store(key, value, expires, bucket)
    }

    fn update(
        &self,
        key: &str,
        value: &[u8],
        expires: u64,
        bucket: &str,
    ) -> Result<(), BackendError> {
        self.store(key, value, expires, bucket)
    }

    fn delete(&self, key: &str, bucket: &str) -> Result<(), BackendError> {
        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| BackendError::LockPoisoned)?;
        if let Some(entries) = buckets.get_mut(bucket) {
            entries.remove(key);
        }
        Ok(())
    }

    fn clear(&self, bucket: &str) -> Result<(), BackendError> {
        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| BackendError::LockPoisoned)?;
        buckets.remove(bucket);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let backend = MemoryBackend::new();
        backend.set("k", b"v", 0, "b").unwrap();
        assert_eq!(backend.get("k", "b").unwrap(), Some(b"v".to_vec()));
        assert!(backend.exists("k", "b").unwrap());
    }

    #[test]
    fn test_buckets_are_isolated() {
        let backend = MemoryBackend::new();
        backend.set("k", b"one", 0, "a").unwrap();
        assert_eq!(backend.get("k", "b").unwrap(), None);
        assert!(!backend.exists("k", "b").unwrap());
    }

    #[test]
    fn test_update_replaces_value() {
        let backend = MemoryBackend::new();
        backend.set("k", b"one", 0, "b").unwrap();
        backend.update("k", b"two", 0, "b").unwrap();
        assert_eq!(backend.get("k", "b").unwrap(), Some(b"two".to_vec()));
        assert_eq!(backend.entry_count("b").unwrap(), 1);
    }

    #[test]
    fn test_delete_absent_key() {
        let backend = MemoryBackend::new();
        backend.delete("missing", "b").unwrap();
        backend.set("k", b"v", 0, "b").unwrap();
        backend.delete("k", "b").unwrap();
        backend.delete("k", "b").unwrap();
        assert!(!backend.exists("k", "b").unwrap());
    }

    #[test]
    fn test_clear_bucket() {
        let backend = MemoryBackend::new();
        backend.set("k1", b"v", 0, "a").unwrap();
        backend.set("k2", b"v", 0, "a").unwrap();
        backend.set("k1", b"v", 0, "other").unwrap();

        backend.clear("a").unwrap();

        assert_eq!(backend.entry_count("a").unwrap(), 0);
        assert_eq!(backend.entry_count("other").unwrap(), 1);
    }

    #[test]
    fn test_expired_entry_reads_as_absent() {
        let backend = MemoryBackend::new();
        let mut entry = MemoryEntry::new(b"v", 1);
        let later = Instant::now() + Duration::from_secs(2);
        assert!(!entry.is_live(later));

        entry.deadline = None;
        assert!(entry.is_live(later));

        backend.set("k", b"v", 3600, "b").unwrap();
        assert!(backend.exists("k", "b").unwrap());
    }
}
