//! Cryptographic primitives for Veilsocks
//!
//! This module provides:
//! - SHA-256 passphrase-to-key derivation
//! - AES-256-CFB per-connection cipher sessions
//! - Secure random number generation

mod cfb;
mod kdf;

pub use cfb::{CipherSession, Decryptor, Encryptor};
pub use kdf::derive_key;

use thiserror::Error;

/// Length of the symmetric key in bytes
pub const KEY_LEN: usize = 32;

/// Length of the initialization vector in bytes (AES block size)
pub const IV_LEN: usize = 16;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Invalid IV length: expected 16 bytes, got {0}")]
    InvalidIvLength(usize),
}

/// Generate cryptographically secure random bytes
pub fn random_bytes(buf: &mut [u8]) {
    use ring::rand::{SecureRandom, SystemRandom};
    let rng = SystemRandom::new();
    rng.fill(buf).expect("Failed to generate random bytes");
}
