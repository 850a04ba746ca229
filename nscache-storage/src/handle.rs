//! Process-wide cache backend handle.
//!
//! The hosting process installs its backend once at startup and tears it
//! down on shutdown. Namespace managers built with
//! [`NamespaceManager::new`](crate::NamespaceManager::new) resolve the backend
//! from here and fail with [`BackendError::Unavailable`] when nothing is
//! installed. A poisoned slot is reported as [`BackendError::LockPoisoned`]
//! by every function in this module.

use std::sync::{Arc, RwLock};

use nscache_core::BackendError;
use once_cell::sync::Lazy;

use crate::backend::CacheBackend;

static BACKEND: Lazy<BackendSlot> = Lazy::new(BackendSlot::default);

#[derive(Default)]
struct BackendSlot {
    inner: RwLock<Option<Arc<dyn CacheBackend>>>,
}

impl BackendSlot {
    fn install(&self, backend: Arc<dyn CacheBackend>) -> Result<(), BackendError> {
        let mut slot = self.inner.write().map_err(|_| BackendError::LockPoisoned)?;
        if slot.replace(backend).is_some() {
            tracing::info!("Replaced installed cache backend");
        } else {
            tracing::info!("Installed cache backend");
        }
        Ok(())
    }

    fn teardown(&self) -> Result<bool, BackendError> {
        let mut slot = self.inner.write().map_err(|_| BackendError::LockPoisoned)?;
        let removed = slot.take().is_some();
        if removed {
            tracing::info!("Cache backend torn down");
        }
        Ok(removed)
    }

    fn resolve(&self) -> Result<Arc<dyn CacheBackend>, BackendError> {
        let slot = self.inner.read().map_err(|_| BackendError::LockPoisoned)?;
        slot.clone().ok_or_else(|| BackendError::Unavailable {
            reason: "no cache backend installed in this process".to_string(),
        })
    }

    fn is_installed(&self) -> Result<bool, BackendError> {
        let slot = self.inner.read().map_err(|_| BackendError::LockPoisoned)?;
        Ok(slot.is_some())
    }
}

/// Install the process-wide backend, replacing any previous one.
pub fn install_backend(backend: Arc<dyn CacheBackend>) -> Result<(), BackendError> {
    BACKEND.install(backend)
}

/// Remove the process-wide backend.
///
/// Returns whether a backend was installed. Managers already holding the
/// backend keep using it.
pub fn teardown_backend() -> Result<bool, BackendError> {
    BACKEND.teardown()
}

/// The installed backend.
pub fn installed_backend() -> Result<Arc<dyn CacheBackend>, BackendError> {
    BACKEND.resolve()
}

pub fn is_backend_installed() -> Result<bool, BackendError> {
    BACKEND.is_installed()
}
