//! Per-connection session
//!
//! Drives one inbound client through the full chain: local handshake, local
//! request, upstream session, then the byte relay.

use crate::config::ConnectionParams;
use crate::socks::auth::accept_no_auth;
use crate::socks::command::{parse_command, send_success};
use crate::socks::tcp_relay::relay_tcp;
use crate::socks::types::SocksCommand;
use crate::socks::upstream::{connect_upstream, send_connect};
use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Handle SOCKS5 protocol on an inbound stream
///
/// # Protocol Flow
///
/// 1. Accept the client's handshake, selecting "no authentication"
/// 2. Parse the request and reply success straight away
/// 3. Open and authenticate the upstream session
/// 4. Ask the upstream to CONNECT to the client's target
/// 5. Relay bytes until both sides close
///
/// The local success reply is sent before the upstream is contacted. If the
/// upstream then fails, the client sees its connection close with no further
/// SOCKS5 signal. Every command is forwarded as CONNECT.
pub async fn handle_socks5_on_stream<S>(mut stream: S, params: &ConnectionParams) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    accept_no_auth(&mut stream)
        .await
        .with_context(|| "Initial handshake failed")?;

    let (command, target_addr) = parse_command(&mut stream)
        .await
        .with_context(|| "Request handling failed")?;

    send_success(&mut stream)
        .await
        .with_context(|| "Request handling failed")?;

    if command != SocksCommand::Connect {
        warn!("{} request to {} forwarded as CONNECT", command, target_addr);
    }
    info!("SOCKS5 {} request to {}", command, target_addr);

    let mut upstream = connect_upstream(params)
        .await
        .with_context(|| "Failed to connect to upstream")?;

    send_connect(&mut upstream, &target_addr)
        .await
        .with_context(|| "Failed to forward request")?;

    debug!(
        "Tunnel established to {} via {}",
        target_addr,
        params.upstream_addr()
    );

    relay_tcp(stream, upstream).await
}
