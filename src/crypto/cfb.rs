//! AES-256-CFB cipher sessions
//!
//! One session per connection. Both the encrypt and decrypt feedback states
//! are seeded from the same `(key, IV)` pair and then advance independently;
//! the relay server does the same on its side, which is what makes the two
//! directions line up on the wire. This key-reuse pattern is part of the
//! wire protocol and must not be "fixed" with per-direction IVs.

use super::{random_bytes, CryptoError, IV_LEN, KEY_LEN};
use aes::Aes256;
use cfb_mode::cipher::KeyIvInit;
use cfb_mode::{BufDecryptor, BufEncryptor};

/// The encrypt half of a session, owned by the client-to-upstream pump.
pub struct Encryptor {
    inner: BufEncryptor<Aes256>,
}

impl Encryptor {
    /// Encrypt a chunk in place, advancing the feedback state.
    ///
    /// Chunks must be fed in exact wire order; the output for a byte stream
    /// is the same no matter how the stream is split into chunks.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        self.inner.encrypt(data);
    }
}

/// The decrypt half of a session, owned by the upstream-to-client pump.
pub struct Decryptor {
    inner: BufDecryptor<Aes256>,
}

impl Decryptor {
    /// Decrypt a chunk in place, advancing the feedback state.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        self.inner.decrypt(data);
    }
}

/// Per-connection cipher session: IV plus paired encrypt/decrypt states.
pub struct CipherSession {
    iv: [u8; IV_LEN],
    encryptor: Encryptor,
    decryptor: Decryptor,
}

impl CipherSession {
    /// Create a session with a fresh random IV (initiating side).
    ///
    /// The IV must be sent to the peer in the clear as the first 16 bytes on
    /// the wire before any ciphertext.
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        let mut iv = [0u8; IV_LEN];
        random_bytes(&mut iv);
        Self::with_iv(key, iv)
    }

    /// Create a session from an explicit IV (responding side, or tests).
    pub fn with_iv(key: &[u8; KEY_LEN], iv: [u8; IV_LEN]) -> Self {
        let encryptor = Encryptor {
            inner: BufEncryptor::new(key.into(), &iv.into()),
        };
        let decryptor = Decryptor {
            inner: BufDecryptor::new(key.into(), &iv.into()),
        };

        Self {
            iv,
            encryptor,
            decryptor,
        }
    }

    /// Create a session from raw slices, e.g. an IV read off the wire.
    pub fn from_slices(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
        let iv: [u8; IV_LEN] = iv
            .try_into()
            .map_err(|_| CryptoError::InvalidIvLength(iv.len()))?;

        Ok(Self::with_iv(&key, iv))
    }

    /// The session IV
    pub fn iv(&self) -> [u8; IV_LEN] {
        self.iv
    }

    /// Encrypt a chunk in place (outbound direction).
    pub fn encrypt(&mut self, data: &mut [u8]) {
        self.encryptor.encrypt(data);
    }

    /// Decrypt a chunk in place (inbound direction).
    pub fn decrypt(&mut self, data: &mut [u8]) {
        self.decryptor.decrypt(data);
    }

    /// Split the session so each relay direction owns exactly one transform.
    pub fn into_split(self) -> (Encryptor, Decryptor) {
        (self.encryptor, self.decryptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::derive_key;

    #[test]
    fn test_roundtrip() {
        let key = derive_key("test passphrase");
        let mut local = CipherSession::new(&key);
        let mut remote = CipherSession::with_iv(&key, local.iv());

        let mut data = b"sherlock holo".to_vec();
        local.encrypt(&mut data);
        assert_ne!(&data, b"sherlock holo");

        remote.decrypt(&mut data);
        assert_eq!(&data, b"sherlock holo");
    }

    #[test]
    fn test_stream_property_chunking() {
        // Any chunking of the input must produce the same ciphertext as a
        // single call over the concatenation.
        let key = derive_key("chunks");
        let iv = [7u8; IV_LEN];
        let plaintext: Vec<u8> = (0..1000).map(|i| (i % 251) as u8).collect();

        let mut whole = plaintext.clone();
        CipherSession::with_iv(&key, iv).encrypt(&mut whole);

        for chunk_size in [1, 3, 16, 17, 256] {
            let mut session = CipherSession::with_iv(&key, iv);
            let mut pieced = plaintext.clone();
            for chunk in pieced.chunks_mut(chunk_size) {
                session.encrypt(chunk);
            }
            assert_eq!(pieced, whole, "chunk size {} diverged", chunk_size);
        }
    }

    #[test]
    fn test_directions_independent() {
        // Advancing the encrypt state must not disturb the decrypt state.
        let key = derive_key("independent");
        let iv = [9u8; IV_LEN];

        let mut session = CipherSession::with_iv(&key, iv);
        let mut noise = vec![0xAAu8; 64];
        session.encrypt(&mut noise);

        let mut reference = CipherSession::with_iv(&key, iv);
        let mut ct = b"payload across the wire".to_vec();
        reference.encrypt(&mut ct);

        session.decrypt(&mut ct);
        assert_eq!(&ct, b"payload across the wire");
    }

    #[test]
    fn test_split_halves_match_whole() {
        let key = derive_key("split");
        let iv = [3u8; IV_LEN];

        let (mut enc, _dec) = CipherSession::with_iv(&key, iv).into_split();
        let mut split_out = b"hello relay".to_vec();
        enc.encrypt(&mut split_out);

        let mut whole_out = b"hello relay".to_vec();
        CipherSession::with_iv(&key, iv).encrypt(&mut whole_out);

        assert_eq!(split_out, whole_out);
    }

    #[test]
    fn test_fresh_iv_per_session() {
        let key = derive_key("iv uniqueness");
        let a = CipherSession::new(&key);
        let b = CipherSession::new(&key);
        assert_ne!(a.iv(), b.iv());
    }

    #[test]
    fn test_from_slices_rejects_bad_lengths() {
        let key = derive_key("lengths");
        assert!(CipherSession::from_slices(&key[..16], &[0u8; IV_LEN]).is_err());
        assert!(CipherSession::from_slices(&key, &[0u8; 8]).is_err());
        assert!(CipherSession::from_slices(&key, &[0u8; IV_LEN]).is_ok());
    }
}
