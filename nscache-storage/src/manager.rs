//! Namespace manager: a key/value view of one namespace in a cache backend.
//!
//! Every operation formats the raw key with the namespace's [`KeyFormatter`]
//! and talks to the backend directly; nothing is cached locally.
//!
//! # Hazards
//!
//! - [`NamespaceManager::write`] checks existence and then issues either
//!   `set` or `update`. The pair is not atomic. Callers that need
//!   populate-once semantics must hold the key's [`CreationLock`] across the
//!   whole read-compute-write sequence (see [`Container::get_or_create`]).
//! - [`NamespaceManager::clear`] clears the entire backend bucket named by the
//!   configured `url`, including keys written by other namespaces sharing it.
//!
//! [`Container::get_or_create`]: crate::Container::get_or_create

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use nscache_core::{
    BackendError, CacheError, CacheResult, FormattedKey, KeyFormatter, LockError,
    NamespaceConfig, RawKey,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::backend::CacheBackend;
use crate::codec::{JsonCodec, ValueCodec};
use crate::handle;
use crate::lock::{verify_directory, CreationLock};

/// Key/value access to one namespace of a cache backend.
pub struct NamespaceManager<C: ValueCodec = JsonCodec> {
    formatter: KeyFormatter,
    bucket: String,
    lock_dir: Option<PathBuf>,
    backend: Arc<dyn CacheBackend>,
    codec: C,
}

impl NamespaceManager<JsonCodec> {
    /// Create a manager over the process-wide backend.
    ///
    /// # Errors
    ///
    /// In order, before any backend call:
    /// - `Config` if `url` is missing or blank
    /// - `Lock(DirectoryUnusable)` if the lock directory cannot be created or written
    /// - `Backend(Unavailable)` if no backend is installed (see [`handle`])
    pub fn new(namespace: impl Into<String>, config: &NamespaceConfig) -> CacheResult<Self> {
        let (bucket, lock_dir) = prepare(config)?;
        let backend = handle::installed_backend()?;
        Ok(Self::assemble(namespace.into(), bucket, lock_dir, backend, JsonCodec))
    }

    /// Create a manager over an explicit backend.
    pub fn with_backend(
        namespace: impl Into<String>,
        config: &NamespaceConfig,
        backend: Arc<dyn CacheBackend>,
    ) -> CacheResult<Self> {
        Self::with_codec(namespace, config, backend, JsonCodec)
    }
}

impl<C: ValueCodec> NamespaceManager<C> {
    /// Create a manager over an explicit backend with a custom value codec.
    pub fn with_codec(
        namespace: impl Into<String>,
        config: &NamespaceConfig,
        backend: Arc<dyn CacheBackend>,
        codec: C,
    ) -> CacheResult<Self> {
        let (bucket, lock_dir) = prepare(config)?;
        Ok(Self::assemble(namespace.into(), bucket, lock_dir, backend, codec))
    }

    fn assemble(
        namespace: String,
        bucket: String,
        lock_dir: Option<PathBuf>,
        backend: Arc<dyn CacheBackend>,
        codec: C,
    ) -> Self {
        if lock_dir.is_none() {
            tracing::warn!(
                namespace = %namespace,
                "No lock directory configured; creation locks unavailable"
            );
        }
        Self {
            formatter: KeyFormatter::new(namespace),
            bucket,
            lock_dir,
            backend,
            codec,
        }
    }

    pub fn namespace(&self) -> &str {
        self.formatter.namespace()
    }

    /// Backend bucket selector (the configured `url`).
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Lock directory in effect, if any.
    pub fn lock_dir(&self) -> Option<&Path> {
        self.lock_dir.as_deref()
    }

    pub fn formatter(&self) -> &KeyFormatter {
        &self.formatter
    }

    /// Backend key for `key` in this namespace.
    pub fn format_key<'a>(&self, key: impl Into<RawKey<'a>>) -> FormattedKey {
        self.formatter.format(key)
    }

    /// Creation lock for `key`.
    ///
    /// Fails with `Lock(Unconfigured)` when the manager has no lock directory.
    pub fn creation_lock<'a>(&self, key: impl Into<RawKey<'a>>) -> CacheResult<CreationLock> {
        let identifier = self.formatter.lock_identifier(key);
        match &self.lock_dir {
            Some(lock_dir) => Ok(CreationLock::new(lock_dir, identifier)),
            None => Err(LockError::Unconfigured { identifier }.into()),
        }
    }

    /// Read and decode the value stored under `key`.
    ///
    /// Fails with `Backend(NotFound)` when the key is absent.
    pub fn read<'a, T: DeserializeOwned>(&self, key: impl Into<RawKey<'a>>) -> CacheResult<T> {
        let key = self.format_key(key);
        tracing::debug!(namespace = %self.namespace(), key = %key, bucket = %self.bucket, "Cache read");
        let bytes = self
            .backend
            .get(key.as_str(), &self.bucket)?
            .ok_or_else(|| BackendError::NotFound {
                key: key.into_string(),
            })?;
        Ok(self.codec.decode(&bytes)?)
    }

    /// Whether `key` is present in the backend.
    pub fn contains<'a>(&self, key: impl Into<RawKey<'a>>) -> CacheResult<bool> {
        let key = self.format_key(key);
        Ok(self.backend.exists(key.as_str(), &self.bucket)?)
    }

    /// Store `value` under `key` with no expiry.
    pub fn write<'a, T: Serialize + ?Sized>(
        &self,
        key: impl Into<RawKey<'a>>,
        value: &T,
    ) -> CacheResult<()> {
        self.store(self.format_key(key), value, 0)
    }

    /// Store `value` under `key`, expiring after `expire_after`.
    ///
    /// Expiry is whole seconds; a partial second rounds up. A zero duration
    /// means no expiry.
    pub fn write_with_expiry<'a, T: Serialize + ?Sized>(
        &self,
        key: impl Into<RawKey<'a>>,
        value: &T,
        expire_after: Duration,
    ) -> CacheResult<()> {
        self.store(self.format_key(key), value, expiry_secs(expire_after))
    }

    fn store<T: Serialize + ?Sized>(
        &self,
        key: FormattedKey,
        value: &T,
        expires: u64,
    ) -> CacheResult<()> {
        let bytes = self.codec.encode(value)?;
        // Not atomic with respect to other writers.
        if self.backend.exists(key.as_str(), &self.bucket)? {
            tracing::debug!(namespace = %self.namespace(), key = %key, expires, "Cache update");
            self.backend
                .update(key.as_str(), &bytes, expires, &self.bucket)?;
        } else {
            tracing::debug!(namespace = %self.namespace(), key = %key, expires, "Cache set");
            self.backend.set(key.as_str(), &bytes, expires, &self.bucket)?;
        }
        Ok(())
    }

    /// Remove `key`. Removing an absent key succeeds.
    pub fn delete<'a>(&self, key: impl Into<RawKey<'a>>) -> CacheResult<()> {
        let key = self.format_key(key);
        tracing::debug!(namespace = %self.namespace(), key = %key, "Cache delete");
        match self.backend.delete(key.as_str(), &self.bucket) {
            Ok(()) | Err(BackendError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Clear the whole backend bucket.
    ///
    /// This removes every key in the bucket, not only this namespace's keys.
    pub fn clear(&self) -> CacheResult<()> {
        tracing::warn!(
            namespace = %self.namespace(),
            bucket = %self.bucket,
            "Clearing entire cache bucket"
        );
        Ok(self.backend.clear(&self.bucket)?)
    }

    /// Always fails: backends cannot enumerate their keys.
    pub fn keys(&self) -> CacheResult<Vec<String>> {
        Err(CacheError::NotSupported {
            operation: "keys".to_string(),
            reason: "backend does not support enumeration".to_string(),
        })
    }
}

impl<C: ValueCodec> std::fmt::Debug for NamespaceManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceManager")
            .field("namespace", &self.namespace())
            .field("bucket", &self.bucket)
            .field("lock_dir", &self.lock_dir)
            .finish_non_exhaustive()
    }
}

/// Validate the config and ready the lock directory.
fn prepare(config: &NamespaceConfig) -> CacheResult<(String, Option<PathBuf>)> {
    let bucket = config.validate()?.to_string();
    let lock_dir = config.resolved_lock_dir();
    if let Some(dir) = &lock_dir {
        verify_directory(dir)?;
    }
    Ok((bucket, lock_dir))
}

fn expiry_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use nscache_core::ConfigError;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Report {
        title: String,
        rows: Vec<u32>,
    }

    fn manager(namespace: &str) -> (NamespaceManager, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let manager =
            NamespaceManager::with_backend(namespace, &NamespaceConfig::new("bucket"), backend.clone())
                .unwrap();
        (manager, backend)
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (manager, _) = manager("reports");
        let report = Report {
            title: "daily".to_string(),
            rows: vec![1, 2, 3],
        };
        manager.write("daily report", &report).unwrap();
        let read: Report = manager.read("daily report").unwrap();
        assert_eq!(read, report);
    }

    #[test]
    fn test_write_uses_formatted_key() {
        let (manager, backend) = manager("ns");
        manager.write("a b", &1u32).unwrap();
        assert!(backend.exists("ns_a\u{00B7}b", "bucket").unwrap());
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let (manager, _) = manager("ns");
        let err = manager.read::<u32>("missing").unwrap_err();
        assert_eq!(
            err,
            CacheError::Backend(BackendError::NotFound {
                key: "ns_missing".to_string()
            })
        );
    }

    #[test]
    fn test_contains_tracks_write_and_delete() {
        let (manager, _) = manager("ns");
        assert!(!manager.contains("k").unwrap());
        manager.write("k", "v").unwrap();
        assert!(manager.contains("k").unwrap());
        manager.delete("k").unwrap();
        assert!(!manager.contains("k").unwrap());
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let (manager, backend) = manager("ns");
        manager.write("k", &1u32).unwrap();
        manager.write("k", &2u32).unwrap();
        assert_eq!(manager.read::<u32>("k").unwrap(), 2);
        assert_eq!(backend.entry_count("bucket").unwrap(), 1);
    }

    #[test]
    fn test_delete_absent_key_succeeds() {
        let (manager, _) = manager("ns");
        manager.delete("never written").unwrap();
    }

    #[test]
    fn test_byte_and_text_keys_share_entries() {
        let (manager, _) = manager("ns");
        manager.write(b"user 1", &"x").unwrap();
        assert_eq!(manager.read::<String>("user 1").unwrap(), "x");
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let backend = Arc::new(MemoryBackend::new());
        let config = NamespaceConfig::new("bucket");
        let a = NamespaceManager::with_backend("a", &config, backend.clone()).unwrap();
        let b = NamespaceManager::with_backend("b", &config, backend).unwrap();

        a.write("k", &1u32).unwrap();
        assert!(!b.contains("k").unwrap());
    }

    #[test]
    fn test_clear_wipes_shared_bucket() {
        let backend = Arc::new(MemoryBackend::new());
        let config = NamespaceConfig::new("shared");
        let a = NamespaceManager::with_backend("a", &config, backend.clone()).unwrap();
        let b = NamespaceManager::with_backend("b", &config, backend).unwrap();

        a.write("k", &1u32).unwrap();
        b.write("k", &2u32).unwrap();
        a.clear().unwrap();

        assert!(!a.contains("k").unwrap());
        assert!(!b.contains("k").unwrap());
    }

    #[test]
    fn test_keys_not_supported() {
        let (manager, _) = manager("ns");
        manager.write("k", &1u32).unwrap();
        let err = manager.keys().unwrap_err();
        assert!(matches!(err, CacheError::NotSupported { ref operation, .. } if operation == "keys"));
    }

    #[test]
    fn test_missing_url_is_config_error() {
        let err = NamespaceManager::with_backend(
            "ns",
            &NamespaceConfig::default(),
            Arc::new(MemoryBackend::new()),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CacheError::Config(ConfigError::MissingRequired {
                field: "url".to_string()
            })
        );

        // checked before the process-wide backend is consulted
        let err = NamespaceManager::new("ns", &NamespaceConfig::default()).unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn test_creation_lock_unconfigured() {
        let (manager, _) = manager("ns");
        assert_eq!(manager.lock_dir(), None);
        let err = manager.creation_lock("k").unwrap_err();
        assert_eq!(
            err,
            CacheError::Lock(LockError::Unconfigured {
                identifier: "nscache/funclock/ns/k".to_string()
            })
        );
    }

    #[test]
    fn test_lock_dir_derived_and_created() {
        let data_dir = tempfile::tempdir().unwrap();
        let config = NamespaceConfig::new("bucket").with_data_dir(data_dir.path());
        let manager =
            NamespaceManager::with_backend("ns", &config, Arc::new(MemoryBackend::new())).unwrap();

        let expected = data_dir.path().join("container_ucd_lock");
        assert_eq!(manager.lock_dir(), Some(expected.as_path()));
        assert!(expected.is_dir());

        let lock = manager.creation_lock("k").unwrap();
        assert!(lock.path().starts_with(&expected));
        assert_eq!(lock.identifier(), "nscache/funclock/ns/k");
    }

    #[test]
    fn test_unusable_lock_dir_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let config = NamespaceConfig::new("bucket").with_lock_dir(&blocker);
        let err =
            NamespaceManager::with_backend("ns", &config, Arc::new(MemoryBackend::new())).unwrap_err();
        assert!(matches!(
            err,
            CacheError::Lock(LockError::DirectoryUnusable { .. })
        ));
    }

    #[test]
    fn test_decode_failure_propagates() {
        let (manager, _) = manager("ns");
        manager.write("k", "text").unwrap();
        let err = manager.read::<u64>("k").unwrap_err();
        assert!(matches!(err, CacheError::Codec(_)));
    }

    #[test]
    fn test_expiry_secs_rounds_up() {
        assert_eq!(expiry_secs(Duration::ZERO), 0);
        assert_eq!(expiry_secs(Duration::from_millis(1)), 1);
        assert_eq!(expiry_secs(Duration::from_secs(5)), 5);
        assert_eq!(expiry_secs(Duration::from_millis(5_500)), 6);
    }

    #[test]
    fn test_accessors() {
        let (manager, _) = manager("ns");
        assert_eq!(manager.namespace(), "ns");
        assert_eq!(manager.bucket(), "bucket");
        assert_eq!(manager.formatter().namespace(), "ns");
        assert_eq!(manager.format_key("a").as_str(), "ns_a");
    }

    #[test]
    fn test_bucket_selector_passed_verbatim() {
        let backend = Arc::new(MemoryBackend::new());
        let manager =
            NamespaceManager::with_backend("ns", &NamespaceConfig::new(" sessions "), backend.clone())
                .unwrap();
        manager.write("k", &1u32).unwrap();

        assert_eq!(manager.bucket(), " sessions ");
        assert_eq!(backend.entry_count(" sessions ").unwrap(), 1);
        assert_eq!(backend.entry_count("sessions").unwrap(), 0);
    }
}
