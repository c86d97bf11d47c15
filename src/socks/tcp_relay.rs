//! Bidirectional byte relay
//!
//! Splices the inbound client connection and the upstream session once both
//! handshakes are complete.

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Relay data bidirectionally between two streams
///
/// Each direction copies until its source reaches EOF (or fails) and then
/// half-closes its destination, so the peer sees EOF in turn. Returns once
/// both directions have finished. Copy errors end that direction and are
/// logged, they do not fail the relay.
pub async fn relay_tcp<A, B>(a: A, b: B) -> Result<()>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let a_to_b = async {
        let result = tokio::io::copy(&mut a_read, &mut b_write).await;
        let _ = b_write.shutdown().await;
        result
    };
    let b_to_a = async {
        let result = tokio::io::copy(&mut b_read, &mut a_write).await;
        let _ = a_write.shutdown().await;
        result
    };

    let (a_to_b, b_to_a) = tokio::join!(a_to_b, b_to_a);

    match a_to_b {
        Ok(bytes) => debug!("A->B finished: {} bytes", bytes),
        Err(e) => debug!("A->B error: {}", e),
    }
    match b_to_a {
        Ok(bytes) => debug!("B->A finished: {} bytes", bytes),
        Err(e) => debug!("B->A error: {}", e),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn test_relay_tcp_both_directions() {
        let (mut client_a, server_a) = duplex(1024);
        let (mut client_b, server_b) = duplex(1024);

        let relay_handle = tokio::spawn(async move { relay_tcp(server_a, server_b).await });

        client_a.write_all(b"hello from a").await.unwrap();
        client_b.write_all(b"hello from b").await.unwrap();

        let mut buf = [0u8; 12];
        client_b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello from a");
        client_a.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello from b");

        drop(client_a);
        drop(client_b);

        let result = tokio::time::timeout(Duration::from_secs(1), relay_handle)
            .await
            .expect("relay did not finish")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_relay_tcp_propagates_half_close() {
        let (mut client_a, server_a) = duplex(1024);
        let (mut client_b, server_b) = duplex(1024);

        let relay_handle = tokio::spawn(async move { relay_tcp(server_a, server_b).await });

        client_a.write_all(b"request").await.unwrap();
        client_a.shutdown().await.unwrap();

        // B sees the data followed by EOF while its own direction stays open.
        let mut received = Vec::new();
        client_b.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"request");

        client_b.write_all(b"response").await.unwrap();
        client_b.shutdown().await.unwrap();

        let mut received = Vec::new();
        client_a.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"response");

        tokio::time::timeout(Duration::from_secs(1), relay_handle)
            .await
            .expect("relay did not finish")
            .unwrap()
            .unwrap();
    }
}
