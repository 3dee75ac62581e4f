//! SOCKS5 front-end
//!
//! Address types shared with the relay header, and the downstream
//! handshake engine.

pub mod socks5;

use thiserror::Error;

/// Proxy errors
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SOCKS version: {0}")]
    InvalidSocksVersion(u8),

    #[error("No acceptable authentication method")]
    NoAcceptableAuth,

    #[error("Unsupported command: {0}")]
    UnsupportedCommand(u8),

    #[error("Address type not supported: {0}")]
    UnsupportedAddressType(u8),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Proxy target address, as requested by the downstream client.
///
/// Domain names are kept as the raw bytes read off the wire so the upstream
/// header forwards them untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// IPv4 address and port
    Ipv4([u8; 4], u16),
    /// IPv6 address and port
    Ipv6([u8; 16], u16),
    /// Domain name (1-255 bytes) and port
    Domain(Vec<u8>, u16),
}

impl Address {
    /// Encode the length-prefixed target header sent to the relay:
    /// `ADDR_LEN(1) | ADDR(ADDR_LEN) | PORT(2, big-endian)`.
    pub fn encode_target(&self) -> Vec<u8> {
        let (raw, port): (&[u8], u16) = match self {
            Address::Ipv4(ip, port) => (ip, *port),
            Address::Ipv6(ip, port) => (ip, *port),
            Address::Domain(domain, port) => (domain, *port),
        };

        let mut buf = Vec::with_capacity(1 + raw.len() + 2);
        buf.push(raw.len() as u8);
        buf.extend_from_slice(raw);
        buf.extend_from_slice(&port.to_be_bytes());
        buf
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Ipv4(ip, port) => {
                write!(f, "{}:{}", std::net::Ipv4Addr::from(*ip), port)
            }
            Address::Ipv6(ip, port) => {
                write!(f, "[{}]:{}", std::net::Ipv6Addr::from(*ip), port)
            }
            Address::Domain(domain, port) => {
                write!(f, "{}:{}", String::from_utf8_lossy(domain), port)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_target_ipv4() {
        let addr = Address::Ipv4([192, 168, 0, 1], 443);
        assert_eq!(addr.encode_target(), vec![4, 192, 168, 0, 1, 0x01, 0xBB]);
    }

    #[test]
    fn test_encode_target_domain() {
        let addr = Address::Domain(b"example.com".to_vec(), 80);
        let mut expected = vec![11];
        expected.extend_from_slice(b"example.com");
        expected.extend_from_slice(&[0x00, 0x50]);
        assert_eq!(addr.encode_target(), expected);
    }

    #[test]
    fn test_encode_target_ipv6() {
        let addr = Address::Ipv6([0u8; 16], 8080);
        let header = addr.encode_target();
        assert_eq!(header[0], 16);
        assert_eq!(header.len(), 1 + 16 + 2);
        assert_eq!(&header[17..], &8080u16.to_be_bytes());
    }

    #[test]
    fn test_display() {
        assert_eq!(Address::Ipv4([127, 0, 0, 1], 80).to_string(), "127.0.0.1:80");
        assert_eq!(
            Address::Domain(b"example.com".to_vec(), 443).to_string(),
            "example.com:443"
        );
    }
}
