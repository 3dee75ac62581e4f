//! # Veilsocks
//!
//! A local SOCKS5 front-end that forwards client traffic to a remote relay
//! over a symmetrically encrypted TCP tunnel.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  SOCKS5   ┌─────────────────┐  AES-256-CFB  ┌──────────┐
//! │ Application │ ────────► │ veilsocks-local │ ────────────► │  relay   │
//! │ (browser..) │ ◄──────── │  (this crate)   │ ◄──────────── │  server  │
//! └─────────────┘           └─────────────────┘               └──────────┘
//! ```
//!
//! Per connection: the SOCKS5 handshake yields a target address, an
//! encrypted session to the fixed relay host is opened (fresh IV sent in
//! the clear, then the encrypted target header), and two relay pumps
//! shuttle bytes until either side closes.

pub mod config;
pub mod crypto;
pub mod proxy;
pub mod relay;

pub use config::Config;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] proxy::ProxyError),

    #[error("Relay error: {0}")]
    Relay(#[from] relay::RelayError),

    #[error("Configuration error: {0}")]
    Config(String),
}
