//! Upstream SOCKS5 session
//!
//! Opens the second hop: TCP connect to the configured upstream proxy,
//! username/password authentication, then a CONNECT for the client's target.
//! The target is always sent as a domain-name address, including IPv4 and
//! IPv6 literals.

use crate::config::ConnectionParams;
use crate::error::Socks5Error;
use crate::socks::auth::authenticate_upstream;
use crate::socks::consts::*;
use crate::socks::types::TargetAddr;
use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Connect and authenticate to the upstream proxy
///
/// Dialing relies on the operating system's connect timeout. The returned
/// stream is ready for [`send_connect`].
pub async fn connect_upstream(params: &ConnectionParams) -> Result<TcpStream> {
    let host = params
        .upstream_host
        .trim_start_matches('[')
        .trim_end_matches(']');
    let mut stream = TcpStream::connect((host, params.upstream_port))
        .await
        .with_context(|| format!("Failed to connect to upstream {}", params.upstream_addr()))?;

    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY on upstream socket: {}", e);
    }

    debug!("Connected to upstream {}", params.upstream_addr());

    authenticate_upstream(&mut stream, &params.username, &params.password).await?;

    Ok(stream)
}

/// Build a domain-style CONNECT request for `target`
///
/// ```text
/// +----+-----+-------+------+-----+--------+------+
/// |VER | CMD |  RSV  | ATYP | LEN |  HOST  | PORT |
/// +----+-----+-------+------+-----+--------+------+
/// | 5  |  1  | X'00' |  3   |  1  | 1..255 |  2   |
/// +----+-----+-------+------+-----+--------+------+
/// ```
pub fn build_connect_request(target: &TargetAddr) -> Result<Vec<u8>, Socks5Error> {
    let host = target.host();
    if host.len() > MAX_FIELD_LEN {
        return Err(Socks5Error::FieldTooLong {
            field: "target host",
            len: host.len(),
        });
    }

    let mut request = Vec::with_capacity(7 + host.len());
    request.extend_from_slice(&[
        SOCKS5_VERSION,
        SOCKS5_CMD_TCP_CONNECT,
        SOCKS5_RESERVED,
        SOCKS5_ADDR_TYPE_DOMAIN,
        host.len() as u8,
    ]);
    request.extend_from_slice(host.as_bytes());
    request.extend_from_slice(&target.port().to_be_bytes());
    Ok(request)
}

/// Ask the upstream to CONNECT to `target` and check its reply
///
/// A non-zero reply code fails with [`Socks5Error::UpstreamConnectFailed`].
/// The reply's bound address is consumed so no reply bytes leak into the
/// relayed stream.
pub async fn send_connect<S>(stream: &mut S, target: &TargetAddr) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = build_connect_request(target)?;
    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut header = [0u8; 4];
    stream
        .read_exact(&mut header)
        .await
        .with_context(|| "Failed to read upstream CONNECT reply")?;

    if header[1] != SOCKS5_REPLY_SUCCEEDED {
        return Err(Socks5Error::UpstreamConnectFailed { code: header[1] }.into());
    }

    let bind_len = match header[3] {
        SOCKS5_ADDR_TYPE_IPV4 => 4,
        SOCKS5_ADDR_TYPE_IPV6 => 16,
        SOCKS5_ADDR_TYPE_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            len[0] as usize
        }
        other => return Err(Socks5Error::AddressTypeNotSupported(other).into()),
    };
    let mut bind = vec![0u8; bind_len + 2];
    stream.read_exact(&mut bind).await?;

    debug!("Upstream accepted CONNECT to {}", target);
    Ok(())
}
