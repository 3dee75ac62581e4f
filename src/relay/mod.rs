//! Encrypted relay to the upstream server
//!
//! Per accepted connection: SOCKS5 handshake, dial the fixed relay host,
//! send the IV and encrypted target header, then pump bytes both ways until
//! either side ends. Every failure here is connection-scoped; the listener
//! keeps accepting.

use crate::crypto::{CipherSession, KEY_LEN};
use crate::proxy::{self, Address, ProxyError};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Relay chunk size: at most one chunk is in flight per direction.
pub const CHUNK_SIZE: usize = 8192;

/// Relay errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("SOCKS5 handshake failed: {0}")]
    Handshake(#[from] ProxyError),

    #[error("Upstream dial failed: {0}")]
    Upstream(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-only relay parameters, shared by every connection.
pub struct RelayContext {
    /// Relay server host
    pub server: String,
    /// Relay server port
    pub server_port: u16,
    /// Key derived from the passphrase at startup
    pub key: [u8; KEY_LEN],
}

/// Dial the relay host and perform the encrypted header handshake.
///
/// Writes the raw 16-byte IV in the clear, then the encrypted
/// `[addr_len, addr, port]` target header. Fire-and-forget: no reply is read
/// back, the relay starts forwarding as soon as it has the header.
pub async fn connect_upstream(
    ctx: &RelayContext,
    target: &Address,
) -> Result<(TcpStream, CipherSession), RelayError> {
    let mut stream = TcpStream::connect((ctx.server.as_str(), ctx.server_port))
        .await
        .map_err(RelayError::Upstream)?;
    stream.set_nodelay(true).ok();

    let mut session = CipherSession::new(&ctx.key);
    let mut header = target.encode_target();
    session.encrypt(&mut header);

    stream.write_all(&session.iv()).await?;
    stream.write_all(&header).await?;
    stream.flush().await?;

    Ok((stream, session))
}

/// Pump bytes from `source` to `sink` through a one-directional transform.
///
/// A zero-length read is an orderly end of stream. Each chunk is fully
/// flushed before the next read, so the cipher feedback state always
/// advances in exact wire order. Returns the number of bytes forwarded.
pub async fn pump<R, W, F>(mut source: R, mut sink: W, mut transform: F) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnMut(&mut [u8]),
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }

        transform(&mut buf[..n]);
        sink.write_all(&buf[..n]).await?;
        sink.flush().await?;
        total += n as u64;
    }
}

/// Handle one accepted downstream connection end to end.
pub async fn handle_connection(
    mut client: TcpStream,
    ctx: Arc<RelayContext>,
) -> Result<(), RelayError> {
    // Failure here means the client already got its error reply (where the
    // protocol defines one); dropping the stream is all that is left to do.
    let target = proxy::socks5::handshake(&mut client).await?;

    let (upstream, session) = connect_upstream(&ctx, &target).await?;
    debug!("relaying {} via {}:{}", target, ctx.server, ctx.server_port);

    let (client_rd, client_wr) = client.into_split();
    let (upstream_rd, upstream_wr) = upstream.into_split();
    let (mut encryptor, mut decryptor) = session.into_split();

    let client_to_upstream = pump(client_rd, upstream_wr, |chunk| encryptor.encrypt(chunk));
    let upstream_to_client = pump(upstream_rd, client_wr, |chunk| decryptor.decrypt(chunk));

    // Paired teardown: when either direction finishes, the other future is
    // dropped here, and the remaining stream halves drop with it. Both
    // sockets close exactly once on return.
    tokio::select! {
        res = client_to_upstream => log_direction("client->upstream", res),
        res = upstream_to_client => log_direction("upstream->client", res),
    }

    Ok(())
}

fn log_direction(direction: &str, result: std::io::Result<u64>) {
    match result {
        Ok(n) => debug!("{} closed after {} bytes", direction, n),
        Err(e) => debug!("{} ended with error: {}", direction, e),
    }
}

/// Accept downstream connections forever, one task per connection.
pub async fn serve(listener: TcpListener, ctx: Arc<RelayContext>) -> std::io::Result<()> {
    info!("relaying to {}:{}", ctx.server, ctx.server_port);

    loop {
        let (client, peer) = listener.accept().await?;
        debug!("connection from {}", peer);

        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(client, ctx).await {
                warn!("connection from {} failed: {}", peer, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_key, IV_LEN};
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_pump_transforms_in_order() {
        let (mut source_tx, source_rx) = duplex(64);
        let (sink_tx, mut sink_rx) = duplex(64);

        let relay = tokio::spawn(pump(source_rx, sink_tx, |chunk| {
            for b in chunk.iter_mut() {
                *b ^= 0xFF;
            }
        }));

        source_tx.write_all(&[0x00, 0x0F, 0xF0]).await.unwrap();
        drop(source_tx); // EOF ends the pump

        let mut out = [0u8; 3];
        sink_rx.read_exact(&mut out).await.unwrap();
        assert_eq!(out, [0xFF, 0xF0, 0x0F]);

        let forwarded = relay.await.unwrap().unwrap();
        assert_eq!(forwarded, 3);
    }

    #[tokio::test]
    async fn test_pump_propagates_eof_without_error() {
        let (source_tx, source_rx) = duplex(64);
        let (sink_tx, _sink_rx) = duplex(64);

        drop(source_tx);
        let forwarded = pump(source_rx, sink_tx, |_| {}).await.unwrap();
        assert_eq!(forwarded, 0);
    }

    #[tokio::test]
    async fn test_connect_upstream_sends_iv_and_encrypted_header() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let key = derive_key("relay header test");

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            let mut iv = [0u8; IV_LEN];
            stream.read_exact(&mut iv).await.unwrap();

            let mut header = [0u8; 1 + 4 + 2];
            stream.read_exact(&mut header).await.unwrap();
            (iv, header)
        });

        let ctx = RelayContext {
            server: addr.ip().to_string(),
            server_port: addr.port(),
            key,
        };
        let target = Address::Ipv4([1, 2, 3, 4], 443);
        let (_upstream, session) = connect_upstream(&ctx, &target).await.unwrap();

        let (iv, mut header) = server.await.unwrap();
        assert_eq!(iv, session.iv());

        let mut responder = CipherSession::from_slices(&key, &iv).unwrap();
        responder.decrypt(&mut header);
        assert_eq!(header, [4, 1, 2, 3, 4, 0x01, 0xBB]);
    }

    #[tokio::test]
    async fn test_connect_upstream_refused() {
        // Port from a listener that is immediately dropped: nothing listens.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let ctx = RelayContext {
            server: addr.ip().to_string(),
            server_port: addr.port(),
            key: derive_key("refused"),
        };
        let target = Address::Ipv4([1, 2, 3, 4], 80);

        assert!(matches!(
            connect_upstream(&ctx, &target).await,
            Err(RelayError::Upstream(_))
        ));
    }
}
