//! Fuzz test for namespaced key formatting
//!
//! Feeds arbitrary bytes as both namespace split point and key to check that
//! formatting never panics and always yields a bounded, deterministic key.
//!
//! Run with: cargo +nightly fuzz run key_format_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use nscache_core::{format_key, KeyFormatter, MAX_KEY_LENGTH};

fuzz_target!(|data: &[u8]| {
    let split = data.first().map(|&b| b as usize).unwrap_or(0).min(data.len());
    let (head, key) = data.split_at(split);
    let namespace = String::from_utf8_lossy(head);

    let formatted = format_key(&namespace, key);

    assert!(formatted.as_str().chars().count() <= MAX_KEY_LENGTH);
    if formatted.is_hashed() {
        assert!(formatted.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
    assert_eq!(formatted, KeyFormatter::new(namespace.to_string()).format(key));
});
