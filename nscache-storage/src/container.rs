//! Caller-facing container over a namespace manager.
//!
//! Adds [`Container::get_or_create`], which runs an expensive computation at
//! most once per key across every process sharing the backend and the lock
//! directory.

use std::time::Duration;

use nscache_core::{CacheResult, RawKey};
use serde::{de::DeserializeOwned, Serialize};

use crate::codec::{JsonCodec, ValueCodec};
use crate::manager::NamespaceManager;

/// Thin facade delegating to a [`NamespaceManager`].
#[derive(Debug)]
pub struct Container<C: ValueCodec = JsonCodec> {
    manager: NamespaceManager<C>,
}

impl<C: ValueCodec> Container<C> {
    pub fn new(manager: NamespaceManager<C>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &NamespaceManager<C> {
        &self.manager
    }

    pub fn into_manager(self) -> NamespaceManager<C> {
        self.manager
    }

    pub fn get<'a, T: DeserializeOwned>(&self, key: impl Into<RawKey<'a>>) -> CacheResult<T> {
        self.manager.read(key)
    }

    pub fn has<'a>(&self, key: impl Into<RawKey<'a>>) -> CacheResult<bool> {
        self.manager.contains(key)
    }

    pub fn set<'a, T: Serialize + ?Sized>(
        &self,
        key: impl Into<RawKey<'a>>,
        value: &T,
    ) -> CacheResult<()> {
        self.manager.write(key, value)
    }

    pub fn set_with_expiry<'a, T: Serialize + ?Sized>(
        &self,
        key: impl Into<RawKey<'a>>,
        value: &T,
        expire_after: Duration,
    ) -> CacheResult<()> {
        self.manager.write_with_expiry(key, value, expire_after)
    }

    pub fn remove<'a>(&self, key: impl Into<RawKey<'a>>) -> CacheResult<()> {
        self.manager.delete(key)
    }

    /// Clears the whole backend bucket. See [`NamespaceManager::clear`].
    pub fn clear(&self) -> CacheResult<()> {
        self.manager.clear()
    }

    /// Return the cached value for `key`, computing and storing it if absent.
    ///
    /// On a miss the key's creation lock is taken and presence re-checked, so
    /// concurrent callers wait for the first one's value instead of calling
    /// `create` again. The lock is released on every exit path. Errors from
    /// `create` are returned unchanged and nothing is stored.
    ///
    /// # Errors
    ///
    /// `Lock(Unconfigured)` on a miss when the manager has no lock directory.
    pub fn get_or_create<'a, T, F>(
        &self,
        key: impl Into<RawKey<'a>>,
        expire_after: Option<Duration>,
        create: F,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> CacheResult<T>,
    {
        let key = key.into();

        if let Some(value) = self.read_if_present(key)? {
            return Ok(value);
        }

        let lock = self.manager.creation_lock(key)?;
        let _guard = lock.acquire()?;

        if let Some(value) = self.read_if_present(key)? {
            tracing::debug!(namespace = %self.manager.namespace(), key = %key, "Value populated while waiting for creation lock");
            return Ok(value);
        }

        tracing::debug!(namespace = %self.manager.namespace(), key = %key, "Creating cache value");
        let value = create()?;
        match expire_after {
            Some(expire_after) => self.manager.write_with_expiry(key, &value, expire_after)?,
            None => self.manager.write(key, &value)?,
        }
        Ok(value)
    }

    fn read_if_present<T: DeserializeOwned>(&self, key: RawKey<'_>) -> CacheResult<Option<T>> {
        match self.manager.read(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<C: ValueCodec> From<NamespaceManager<C>> for Container<C> {
    fn from(manager: NamespaceManager<C>) -> Self {
        Self::new(manager)
    }
}
