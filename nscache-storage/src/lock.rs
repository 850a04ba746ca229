//! File-backed creation locks.
//!
//! A creation lock serializes the "check, compute, populate" sequence for one
//! logical cache key across every process sharing a lock directory. Locks are
//! advisory `flock`-style exclusive locks on a per-key file; the file itself
//! persists, only its lock state is transient.
//!
//! # Lock File Layout
//!
//! ```text
//! <lock_dir>/<h[0]>/<h[0..2]>/<h>.lock      h = sha1_hex(identifier)
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use nscache_core::{sha1_hex, LockError};

const LOCK_EXTENSION: &str = "lock";

/// Name of the file written and removed when checking a directory.
const PROBE_FILE: &str = ".nscache-probe";

/// Cross-process mutual exclusion for one `(namespace, key)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationLock {
    identifier: String,
    path: PathBuf,
}

impl CreationLock {
    /// Lock for `identifier`, with its file under `lock_dir`.
    pub fn new(lock_dir: &Path, identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let path = lock_file_path(lock_dir, &identifier);
        Self { identifier, path }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the lock is held.
    pub fn acquire(&self) -> Result<CreationLockGuard, LockError> {
        let file = self.open()?;
        tracing::trace!(identifier = %self.identifier, path = ?self.path, "Waiting for creation lock");
        FileExt::lock_exclusive(&file).map_err(|e| LockError::AcquireFailed {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        tracing::trace!(identifier = %self.identifier, "Creation lock acquired");
        Ok(CreationLockGuard {
            file,
            identifier: self.identifier.clone(),
        })
    }

    /// Take the lock if nobody holds it, without blocking.
    pub fn try_acquire(&self) -> Result<Option<CreationLockGuard>, LockError> {
        let file = self.open()?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                tracing::trace!(identifier = %self.identifier, "Creation lock acquired");
                Ok(Some(CreationLockGuard {
                    file,
                    identifier: self.identifier.clone(),
                }))
            }
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(LockError::AcquireFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn open(&self) -> Result<File, LockError> {
        let acquire_failed = |e: std::io::Error| LockError::AcquireFailed {
            path: self.path.clone(),
            reason: e.to_string(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(acquire_failed)?;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(acquire_failed)
    }
}

/// A held creation lock. Dropping the guard releases the lock.
#[derive(Debug)]
pub struct CreationLockGuard {
    file: File,
    identifier: String,
}

impl CreationLockGuard {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl Drop for CreationLockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(identifier = %self.identifier, error = %e, "Failed to unlock creation lock");
        } else {
            tracing::trace!(identifier = %self.identifier, "Creation lock released");
        }
    }
}

/// Make sure `path` is an existing, writable directory, creating it if needed.
pub fn verify_directory(path: &Path) -> Result<(), LockError> {
    let unusable = |reason: String| LockError::DirectoryUnusable {
        path: path.to_path_buf(),
        reason,
    };

    fs::create_dir_all(path).map_err(|e| unusable(e.to_string()))?;
    if !path.is_dir() {
        return Err(unusable("not a directory".to_string()));
    }

    let probe = path.join(format!("{}-{}", PROBE_FILE, std::process::id()));
    File::create(&probe).map_err(|e| unusable(format!("not writable: {}", e)))?;
    match fs::remove_file(&probe) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(unusable(format!("cannot remove probe file: {}", e))),
    }
}

fn lock_file_path(lock_dir: &Path, identifier: &str) -> PathBuf {
    let digest = sha1_hex(identifier.as_bytes());
    lock_dir
        .join(&digest[0..1])
        .join(&digest[0..2])
        .join(format!("{}.{}", digest, LOCK_EXTENSION))
}

fn is_contended(error: &std::io::Error) -> bool {
    error.kind() == ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_file_path_layout() {
        let lock = CreationLock::new(Path::new("/locks"), "nscache/funclock/ns/k");
        let digest = sha1_hex(b"nscache/funclock/ns/k");
        let expected = PathBuf::from("/locks")
            .join(&digest[0..1])
            .join(&digest[0..2])
            .join(format!("{}.lock", digest));
        assert_eq!(lock.path(), expected.as_path());
        assert_eq!(lock.identifier(), "nscache/funclock/ns/k");
    }

    #[test]
    fn test_distinct_identifiers_distinct_files() {
        let a = CreationLock::new(Path::new("/locks"), "nscache/funclock/ns/a");
        let b = CreationLock::new(Path::new("/locks"), "nscache/funclock/ns/b");
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_acquire_release_reacquire() {
        let dir = tempfile::tempdir().unwrap();
        let lock = CreationLock::new(dir.path(), "nscache/funclock/ns/k");

        let guard = lock.acquire().unwrap();
        assert_eq!(guard.identifier(), "nscache/funclock/ns/k");
        assert!(lock.try_acquire().unwrap().is_none());
        drop(guard);

        let again = lock.try_acquire().unwrap();
        assert!(again.is_some());
    }

    #[test]
    fn test_lock_file_persists_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = CreationLock::new(dir.path(), "nscache/funclock/ns/k");
        drop(lock.acquire().unwrap());
        assert!(lock.path().exists());
    }

    #[test]
    fn test_independent_keys_do_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let a = CreationLock::new(dir.path(), "nscache/funclock/ns/a");
        let b = CreationLock::new(dir.path(), "nscache/funclock/ns/b");

        let _held = a.acquire().unwrap();
        assert!(b.try_acquire().unwrap().is_some());
    }

    #[test]
    fn test_released_on_panic() {
        let dir = tempfile::tempdir().unwrap();
        let lock = CreationLock::new(dir.path(), "nscache/funclock/ns/k");

        let result = std::panic::catch_unwind(|| {
            let _guard = lock.acquire().unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(lock.try_acquire().unwrap().is_some());
    }

    #[test]
    fn test_verify_directory_creates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        verify_directory(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(fs::read_dir(&nested).unwrap().count(), 0);
    }

    #[test]
    fn test_verify_directory_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, b"x").unwrap();

        let err = verify_directory(&file).unwrap_err();
        assert!(matches!(err, LockError::DirectoryUnusable { .. }));
    }
}
