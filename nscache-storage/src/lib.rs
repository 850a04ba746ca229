//! nscache Storage - Namespaced Access to Shared Cache Backends
//!
//! Maps application keys into a byte-oriented cache backend shared by many
//! processes, and coordinates expensive cache fills across those processes.
//!
//! # Components
//!
//! - [`NamespaceManager`]: read/contains/write/delete/clear for one namespace
//! - [`CreationLock`]: file-backed, cross-process lock per `(namespace, key)`
//! - [`Container`]: caller facade with populate-once [`Container::get_or_create`]
//! - [`CacheBackend`]: the backend protocol; [`MemoryBackend`] implements it in-process
//! - [`handle`]: the process-wide backend slot used by [`NamespaceManager::new`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nscache_storage::{handle, Container, MemoryBackend, NamespaceConfig, NamespaceManager};
//!
//! handle::install_backend(Arc::new(MemoryBackend::new()))?;
//!
//! let config = NamespaceConfig::new("reports").with_data_dir("/var/lib/app");
//! let container = Container::from(NamespaceManager::new("daily", &config)?);
//!
//! let total: u64 = container.get_or_create("2024-01-01", None, || Ok(42))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backend;
pub mod codec;
pub mod container;
pub mod handle;
pub mod lock;
pub mod manager;

pub use backend::{CacheBackend, MemoryBackend};
pub use codec::{JsonCodec, ValueCodec};
pub use container::Container;
pub use lock::{verify_directory, CreationLock, CreationLockGuard};
pub use manager::NamespaceManager;

// Re-export core types used in this crate's signatures
pub use nscache_core::{
    BackendError, CacheError, CacheResult, CodecError, ConfigError, FormattedKey, KeyFormatter,
    LockError, NamespaceConfig, RawKey,
};
