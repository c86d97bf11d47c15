//! Test utilities and mocks for socks5-chain
//!
//! This module provides a scripted upstream SOCKS5 server and helpers for
//! driving the relay as a SOCKS5 client.

#![allow(dead_code)]

use socks5_chain::config::ConnectionParams;
use socks5_chain::server::RelayServer;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Credentials the mock upstream accepts
pub const UPSTREAM_USERNAME: &str = "testuser";
/// Password the mock upstream accepts
pub const UPSTREAM_PASSWORD: &str = "testpass";

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// What the mock upstream saw on one connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamRecord {
    /// Username sent in the RFC 1929 request
    pub username: String,
    /// Password sent in the RFC 1929 request
    pub password: String,
    /// CONNECT request as `(atyp, host, port)`, if one arrived
    pub connect: Option<(u8, String, u16)>,
}

/// Scripted upstream SOCKS5 proxy
///
/// Requires username/password auth, answers CONNECT with `connect_status`
/// and, on success, echoes every byte back.
pub struct MockUpstream {
    /// Listening address
    pub addr: SocketAddr,
    records: Arc<Mutex<Vec<UpstreamRecord>>>,
    handle: JoinHandle<()>,
}

impl MockUpstream {
    /// Upstream that accepts [`UPSTREAM_USERNAME`]/[`UPSTREAM_PASSWORD`]
    pub async fn start() -> Self {
        Self::start_with_status(0x00).await
    }

    /// Upstream that replies to CONNECT with `connect_status`
    pub async fn start_with_status(connect_status: u8) -> Self {
        let (listener, addr) = create_test_listener().await;
        let records = Arc::new(Mutex::new(Vec::new()));

        let shared = Arc::clone(&records);
        let handle = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    let _ = serve_upstream(stream, connect_status, shared).await;
                });
            }
        });

        MockUpstream {
            addr,
            records,
            handle,
        }
    }

    /// Everything recorded so far
    pub fn records(&self) -> Vec<UpstreamRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Connection parameters pointing at this upstream
    pub fn params(&self, username: &str, password: &str) -> ConnectionParams {
        ConnectionParams {
            upstream_host: self.addr.ip().to_string(),
            upstream_port: self.addr.port(),
            username: username.to_string(),
            password: password.to_string(),
            local_host: "127.0.0.1".to_string(),
            local_port: 0,
        }
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_upstream(
    mut stream: TcpStream,
    connect_status: u8,
    records: Arc<Mutex<Vec<UpstreamRecord>>>,
) -> std::io::Result<()> {
    // Method negotiation: expect {5, 1, 2}
    let mut greeting = [0u8; 3];
    stream.read_exact(&mut greeting).await?;
    assert_eq!(greeting, [0x05, 0x01, 0x02]);
    stream.write_all(&[0x05, 0x02]).await?;

    // RFC 1929 sub-negotiation
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await?;
    assert_eq!(header[0], 0x01);
    let mut username = vec![0u8; header[1] as usize];
    stream.read_exact(&mut username).await?;
    let mut plen = [0u8; 1];
    stream.read_exact(&mut plen).await?;
    let mut password = vec![0u8; plen[0] as usize];
    stream.read_exact(&mut password).await?;

    let index = {
        let mut records = records.lock().unwrap();
        records.push(UpstreamRecord {
            username: String::from_utf8_lossy(&username).into_owned(),
            password: String::from_utf8_lossy(&password).into_owned(),
            connect: None,
        });
        records.len() - 1
    };

    if username != UPSTREAM_USERNAME.as_bytes() || password != UPSTREAM_PASSWORD.as_bytes() {
        stream.write_all(&[0x01, 0x01]).await?;
        return Ok(());
    }
    stream.write_all(&[0x01, 0x00]).await?;

    // CONNECT request
    let mut request = [0u8; 4];
    stream.read_exact(&mut request).await?;
    let atyp = request[3];
    let mut len = [0u8; 1];
    stream.read_exact(&mut len).await?;
    let mut host = vec![0u8; len[0] as usize];
    stream.read_exact(&mut host).await?;
    let mut port = [0u8; 2];
    stream.read_exact(&mut port).await?;

    records.lock().unwrap()[index].connect = Some((
        atyp,
        String::from_utf8_lossy(&host).into_owned(),
        u16::from_be_bytes(port),
    ));

    stream
        .write_all(&[0x05, connect_status, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
        .await?;
    if connect_status != 0x00 {
        return Ok(());
    }

    let (mut reader, mut writer) = stream.split();
    tokio::io::copy(&mut reader, &mut writer).await?;
    writer.shutdown().await?;
    Ok(())
}

/// Relay server bound to an ephemeral local port and serving in the background
pub struct RunningRelay {
    /// Relay under test
    pub server: Arc<RelayServer>,
    /// Local SOCKS5 address
    pub addr: SocketAddr,
    handle: JoinHandle<Result<(), socks5_chain::ChainError>>,
}

impl RunningRelay {
    /// Bind and serve `params` on 127.0.0.1:0
    pub async fn start(params: ConnectionParams) -> Self {
        let server = Arc::new(RelayServer::new(params).with_grace_period(Duration::from_secs(1)));
        let addr = server.bind("127.0.0.1:0").await.unwrap();

        let serving = Arc::clone(&server);
        let handle = tokio::spawn(async move { serving.serve().await });

        RunningRelay {
            server,
            addr,
            handle,
        }
    }

    /// Stop the relay and wait for the accept loop to exit
    pub async fn shutdown(self) {
        self.server.stop().await;
        self.handle.await.unwrap().unwrap();
    }
}

/// SOCKS5 client byte builders
pub mod socks5_mock {
    use socks5_chain::socks::*;

    /// Create a no-auth method selection request
    pub fn create_auth_request_no_auth() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    }

    /// Create a connect command to IPv4 address
    pub fn create_connect_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV4,
        ];
        cmd.extend_from_slice(&ip);
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// Create a connect command to domain
    pub fn create_connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        cmd.extend_from_slice(domain.as_bytes());
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// Create a connect command to an IPv6 address
    pub fn create_connect_ipv6(ip: [u8; 16], port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV6,
        ];
        cmd.extend_from_slice(&ip);
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }
}

/// Connect to the relay and complete the no-auth handshake plus `request`
///
/// Returns the stream positioned after the relay's 10-byte reply.
pub async fn socks5_connect(relay: SocketAddr, request: &[u8]) -> (TcpStream, [u8; 10]) {
    let mut stream = TcpStream::connect(relay).await.unwrap();

    stream
        .write_all(&socks5_mock::create_auth_request_no_auth())
        .await
        .unwrap();
    let mut method = [0u8; 2];
    stream.read_exact(&mut method).await.unwrap();
    assert_eq!(method, [0x05, 0x00]);

    stream.write_all(request).await.unwrap();
    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();

    (stream, reply)
}
