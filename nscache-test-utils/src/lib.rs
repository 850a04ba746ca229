//! nscache Test Utilities
//!
//! Centralized test infrastructure for the nscache workspace:
//! - Proptest generators for namespaces and keys
//! - A call-recording cache backend
//! - Lock directory and configuration fixtures
//! - Tracing setup for tests

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use tempfile::TempDir;

// Re-export the types most tests need
pub use nscache_core::{
    format_key, sha1_hex, BackendError, CacheError, CacheResult, ConfigError, FormattedKey,
    KeyFormatter, LockError, NamespaceConfig, RawKey, MAX_KEY_LENGTH, SPACE_PLACEHOLDER,
};
pub use nscache_storage::{CacheBackend, Container, CreationLock, MemoryBackend, NamespaceManager};

// ============================================================================
// TRACING
// ============================================================================

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Namespaces made of identifier-ish characters.
pub fn namespace_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9._:-]{0,31}"
}

/// Short text keys, spaces included, that never reach the hashing threshold.
pub fn text_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _:/-]{0,64}"
}

/// Text keys long enough to always be hashed.
pub fn long_key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9 ]{260,512}"
}

/// Arbitrary byte keys.
pub fn byte_key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..300)
}

// ============================================================================
// RECORDING BACKEND
// ============================================================================

/// One call made against a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Exists { key: String, bucket: String },
    Get { key: String, bucket: String },
    Set { key: String, expires: u64, bucket: String },
    Update { key: String, expires: u64, bucket: String },
    Delete { key: String, bucket: String },
    Clear { bucket: String },
}

/// In-memory backend that logs every call before serving it.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    inner: MemoryBackend,
    calls: Mutex<Vec<BackendCall>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Calls made so far, oldest first.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn reset(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn record(&self, call: BackendCall) -> Result<(), BackendError> {
        self.calls
            .lock()
            .map_err(|_| BackendError::LockPoisoned)?
            .push(call);
        Ok(())
    }
}

impl CacheBackend for RecordingBackend {
    fn exists(&self, key: &str, bucket: &str) -> Result<bool, BackendError> {
        self.record(BackendCall::Exists {
            key: key.to_string(),
            bucket: bucket.to_string(),
        })?;
        self.inner.exists(key, bucket)
    }

    fn get(&self, key: &str, bucket: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.record(BackendCall::Get {
            key: key.to_string(),
            bucket: bucket.to_string(),
        })?;
        self.inner.get(key, bucket)
    }

    fn set(
        &self,
        key: &str,
        value: &[u8],
        expires: u64,
        bucket: &str,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::Set {
            key: key.to_string(),
            expires,
            bucket: bucket.to_string(),
        })?;
        self.inner.set(key, value, expires, bucket)
    }

    fn update(
        &self,
        key: &str,
        value: &[u8],
        expires: u64,
        bucket: &str,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::Update {
            key: key.to_string(),
            expires,
            bucket: bucket.to_string(),
        })?;
        self.inner.update(key, value, expires, bucket)
    }

    fn delete(&self, key: &str, bucket: &str) -> Result<(), BackendError> {
        self.record(BackendCall::Delete {
            key: key.to_string(),
            bucket: bucket.to_string(),
        })?;
        self.inner.delete(key, bucket)
    }

    fn clear(&self, bucket: &str) -> Result<(), BackendError> {
        self.record(BackendCall::Clear {
            bucket: bucket.to_string(),
        })?;
        self.inner.clear(bucket)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Temporary lock directory removed on drop.
pub struct TempLockDir {
    dir: TempDir,
}

impl TempLockDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp lock dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Config for bucket `url` with this directory as lock directory.
    pub fn config(&self, url: &str) -> NamespaceConfig {
        NamespaceConfig::new(url).with_lock_dir(self.path())
    }

    /// Config for bucket `url` deriving its lock directory from this one.
    pub fn data_dir_config(&self, url: &str) -> NamespaceConfig {
        NamespaceConfig::new(url).with_data_dir(self.path())
    }

    /// Where a data-dir config puts its lock files.
    pub fn derived_lock_dir(&self) -> PathBuf {
        self.path().join(nscache_core::LOCK_SUBDIR)
    }
}

impl Default for TempLockDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Config for bucket `url` without any lock directory.
pub fn test_config(url: &str) -> NamespaceConfig {
    NamespaceConfig::new(url)
}

/// Manager for `namespace` in bucket `"test"` over `backend`, with locks under `lock_dir`.
pub fn test_manager(
    namespace: &str,
    backend: Arc<dyn CacheBackend>,
    lock_dir: &TempLockDir,
) -> NamespaceManager {
    NamespaceManager::with_backend(namespace, &lock_dir.config("test"), backend)
        .expect("build test manager")
}

// ============================================================================
// ASSERTIONS
// ============================================================================

/// Assert the error is a backend `NotFound`.
pub fn assert_not_found<T: std::fmt::Debug>(result: CacheResult<T>) {
    match result {
        Err(CacheError::Backend(BackendError::NotFound { .. })) => {}
        other => panic!("expected NotFound, got {:?}", other),
    }
}
