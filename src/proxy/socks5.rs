//! SOCKS5 handshake engine (RFC 1928 subset)
//!
//! Drives the greeting/method-selection and CONNECT-request exchange with a
//! downstream client. Only the no-auth method and the CONNECT command are
//! supported; everything else gets the protocol-defined error reply and a
//! connection-scoped failure.

use super::{Address, ProxyError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// SOCKS5 version
const SOCKS_VERSION: u8 = 0x05;

/// No-authentication method ID
const METHOD_NO_AUTH: u8 = 0x00;

/// "No acceptable methods" sentinel
const METHOD_NO_ACCEPTABLE: u8 = 0xFF;

/// CONNECT command
const CMD_CONNECT: u8 = 0x01;

/// Address types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum AddressType {
    Ipv4 = 0x01,
    Domain = 0x03,
    Ipv6 = 0x04,
}

/// Reply codes
#[derive(Debug, Clone, Copy)]
#[repr(u8)]
enum Reply {
    Succeeded = 0x00,
    CommandNotSupported = 0x07,
    AddressTypeNotSupported = 0x08,
}

/// Perform the SOCKS5 handshake with a downstream client.
///
/// On success the validated target address is returned and a success reply
/// has been written. On a protocol-level failure the defined error reply (if
/// any) has been written before the error is returned; the caller closes the
/// connection in either case.
pub async fn handshake<S>(stream: &mut S) -> Result<Address, ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Greeting: VER NMETHODS METHODS...
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await?;

    if header[0] != SOCKS_VERSION {
        return Err(ProxyError::InvalidSocksVersion(header[0]));
    }

    let nmethods = header[1] as usize;
    let mut methods = [0u8; 255];
    stream.read_exact(&mut methods[..nmethods]).await?;

    if !methods[..nmethods].contains(&METHOD_NO_AUTH) {
        stream
            .write_all(&[SOCKS_VERSION, METHOD_NO_ACCEPTABLE])
            .await?;
        return Err(ProxyError::NoAcceptableAuth);
    }

    stream.write_all(&[SOCKS_VERSION, METHOD_NO_AUTH]).await?;

    // Request: VER CMD RSV ATYP
    let mut request = [0u8; 4];
    stream.read_exact(&mut request).await?;

    if request[1] != CMD_CONNECT {
        let reply = make_reply(Reply::CommandNotSupported, AddressType::Ipv4);
        stream.write_all(&reply).await?;
        return Err(ProxyError::UnsupportedCommand(request[1]));
    }

    let address = match request[3] {
        atyp if atyp == AddressType::Ipv4 as u8 => {
            let mut ip = [0u8; 4];
            stream.read_exact(&mut ip).await?;
            let port = read_port(stream).await?;
            Address::Ipv4(ip, port)
        }
        atyp if atyp == AddressType::Domain as u8 => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            // Domain names are 1-255 bytes; a zero length leaves the relay
            // with nothing to dial.
            if len[0] == 0 {
                let reply = make_reply(Reply::AddressTypeNotSupported, AddressType::Ipv4);
                stream.write_all(&reply).await?;
                return Err(ProxyError::InvalidAddress(
                    "zero-length domain name".to_string(),
                ));
            }
            let mut domain = vec![0u8; len[0] as usize];
            stream.read_exact(&mut domain).await?;
            let port = read_port(stream).await?;
            Address::Domain(domain, port)
        }
        atyp if atyp == AddressType::Ipv6 as u8 => {
            let mut ip = [0u8; 16];
            stream.read_exact(&mut ip).await?;
            let port = read_port(stream).await?;
            Address::Ipv6(ip, port)
        }
        atyp => {
            let reply = make_reply(Reply::AddressTypeNotSupported, AddressType::Ipv4);
            stream.write_all(&reply).await?;
            return Err(ProxyError::UnsupportedAddressType(atyp));
        }
    };

    debug!("SOCKS5 CONNECT to {}", address);

    // Bound address is a placeholder: IPv4 0.0.0.0:0, or [::]:0 for an IPv6
    // request, since the actual dial happens at the relay.
    let reply_atyp = match address {
        Address::Ipv6(..) => AddressType::Ipv6,
        _ => AddressType::Ipv4,
    };
    stream
        .write_all(&make_reply(Reply::Succeeded, reply_atyp))
        .await?;

    Ok(address)
}

/// Build a reply frame with an all-zero bound address and port.
fn make_reply(reply: Reply, atyp: AddressType) -> Vec<u8> {
    let mut buf = vec![SOCKS_VERSION, reply as u8, 0x00, atyp as u8];
    match atyp {
        AddressType::Ipv6 => buf.extend_from_slice(&[0u8; 16]),
        _ => buf.extend_from_slice(&[0u8; 4]),
    }
    buf.extend_from_slice(&0u16.to_be_bytes());
    buf
}

async fn read_port<S: AsyncRead + Unpin>(stream: &mut S) -> Result<u16, ProxyError> {
    let mut port = [0u8; 2];
    stream.read_exact(&mut port).await?;
    Ok(u16::from_be_bytes(port))
}
