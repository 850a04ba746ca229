//! nscache Core - Keys, Configuration and Errors
//!
//! Pure data shared by every nscache crate. Nothing here touches the
//! filesystem or a cache backend.

pub mod config;
pub mod error;
pub mod key;

pub use config::{NamespaceConfig, LOCK_SUBDIR};
pub use error::{BackendError, CacheError, CacheResult, CodecError, ConfigError, LockError};
pub use key::{
    format_key, lock_identifier, sha1_hex, FormattedKey, KeyFormatter, RawKey, DIGEST_HEX_LENGTH,
    LOCK_KIND, MAX_KEY_LENGTH, SPACE_PLACEHOLDER,
};
