//! Key derivation
//!
//! Derives the session key from the shared passphrase. The relay server uses
//! the same derivation, so any change here is a wire-compatibility break.

use super::KEY_LEN;
use sha2::{Digest, Sha256};

/// Derive a 32-byte session key from a passphrase.
///
/// SHA-256 over the UTF-8 passphrase bytes. Deterministic: the same
/// passphrase always yields the same key, so the key can be derived once at
/// startup and shared read-only across connections.
pub fn derive_key(passphrase: &str) -> [u8; KEY_LEN] {
    Sha256::digest(passphrase.as_bytes()).into()
}
