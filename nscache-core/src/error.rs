//! Error types for nscache operations

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Cache backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Cache backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Key not found: {key}")]
    NotFound { key: String },

    #[error("Backend {operation} failed for {key}: {reason}")]
    OperationFailed {
        operation: String,
        key: String,
        reason: String,
    },

    #[error("Backend lock poisoned")]
    LockPoisoned,
}

/// Creation lock errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("Lock directory {path:?} is unusable: {reason}")]
    DirectoryUnusable { path: PathBuf, reason: String },

    #[error("No lock directory configured for {identifier}")]
    Unconfigured { identifier: String },

    #[error("Failed to acquire lock file {path:?}: {reason}")]
    AcquireFailed { path: PathBuf, reason: String },
}

/// Value serialization errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Encoding failed: {reason}")]
    Encode { reason: String },

    #[error("Decoding failed: {reason}")]
    Decode { reason: String },
}

/// Master error type for all nscache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Operation {operation} not supported: {reason}")]
    NotSupported { operation: String, reason: String },
}

impl CacheError {
    /// True when the error reports a key absent from the backend.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::Backend(BackendError::NotFound { .. }))
    }
}

/// Result type alias for nscache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================
