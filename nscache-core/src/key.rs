//! Namespaced key formatting for byte-oriented cache backends.
//!
//! Every process sharing a backend must derive the same backend key for the
//! same logical key without talking to each other, so formatting is a pure
//! function of `(namespace, raw key)`.
//!
//! # Format
//!
//! ```text
//! <namespace>_<key with ' ' replaced by '·'>
//! ```
//!
//! When that string is longer than [`MAX_KEY_LENGTH`] characters it is replaced
//! by the lowercase hex SHA-1 digest of its UTF-8 bytes (40 characters).

use std::borrow::Cow;
use std::fmt;

use sha1::{Digest, Sha1};

/// Longest formatted key, in characters, accepted before hashing kicks in.
pub const MAX_KEY_LENGTH: usize = 250;

/// Replacement for space characters in raw keys (MIDDLE DOT, U+00B7).
pub const SPACE_PLACEHOLDER: char = '\u{00B7}';

/// Separator between namespace and key.
const SEPARATOR: char = '_';

/// Length of a hex-encoded SHA-1 digest.
pub const DIGEST_HEX_LENGTH: usize = 40;

/// Prefix of creation lock identifiers.
pub const LOCK_KIND: &str = "nscache";

/// An application-supplied key, either text or raw bytes.
///
/// Bytes are decoded as ISO-8859-1: each byte becomes the code point with the
/// same value. Pure ASCII byte keys therefore format exactly like the
/// equivalent text key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKey<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
}

impl<'a> RawKey<'a> {
    /// Decode the key to text.
    pub fn as_text(&self) -> Cow<'a, str> {
        match *self {
            RawKey::Text(s) => Cow::Borrowed(s),
            RawKey::Bytes(bytes) => Cow::Owned(decode_latin1(bytes)),
        }
    }
}

impl<'a> From<&'a str> for RawKey<'a> {
    fn from(s: &'a str) -> Self {
        RawKey::Text(s)
    }
}

impl<'a> From<&'a String> for RawKey<'a> {
    fn from(s: &'a String) -> Self {
        RawKey::Text(s.as_str())
    }
}

impl<'a> From<&'a [u8]> for RawKey<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        RawKey::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for RawKey<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        RawKey::Bytes(bytes.as_slice())
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for RawKey<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        RawKey::Bytes(bytes.as_slice())
    }
}

impl fmt::Display for RawKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// A backend-safe key derived from a namespace and a raw key.
///
/// Only [`KeyFormatter`] and [`format_key`] construct these, so a
/// `FormattedKey` is always at most [`MAX_KEY_LENGTH`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormattedKey {
    inner: String,
    hashed: bool,
}

impl FormattedKey {
    /// The key as sent to the backend.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Consume the key, returning the backend string.
    pub fn into_string(self) -> String {
        self.inner
    }

    /// Whether the key was too long and got replaced by its digest.
    pub fn is_hashed(&self) -> bool {
        self.hashed
    }
}

impl fmt::Display for FormattedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl AsRef<str> for FormattedKey {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

/// Formats raw keys for a single namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyFormatter {
    namespace: String,
}

impl KeyFormatter {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Map a raw key to its backend key.
    pub fn format<'a>(&self, key: impl Into<RawKey<'a>>) -> FormattedKey {
        format_key(&self.namespace, key)
    }

    /// Identifier of the creation lock guarding `key` in this namespace.
    pub fn lock_identifier<'a>(&self, key: impl Into<RawKey<'a>>) -> String {
        lock_identifier(&self.namespace, key)
    }
}

/// Map `(namespace, key)` to a backend key.
pub fn format_key<'a>(namespace: &str, key: impl Into<RawKey<'a>>) -> FormattedKey {
    let key = key.into().as_text();

    let mut formatted = String::with_capacity(namespace.len() + 1 + key.len());
    formatted.push_str(namespace);
    formatted.push(SEPARATOR);
    formatted.extend(
        key.chars()
            .map(|c| if c == ' ' { SPACE_PLACEHOLDER } else { c }),
    );

    if formatted.chars().count() > MAX_KEY_LENGTH {
        FormattedKey {
            inner: sha1_hex(formatted.as_bytes()),
            hashed: true,
        }
    } else {
        FormattedKey {
            inner: formatted,
            hashed: false,
        }
    }
}

/// Creation lock identifier: `nscache/funclock/<namespace>/<key>`.
///
/// Uses the decoded key before space substitution.
pub fn lock_identifier<'a>(namespace: &str, key: impl Into<RawKey<'a>>) -> String {
    format!(
        "{}/funclock/{}/{}",
        LOCK_KIND,
        namespace,
        key.into().as_text()
    )
}

/// Lowercase hex SHA-1 digest of `bytes`.
pub fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Decode bytes as ISO-8859-1.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
