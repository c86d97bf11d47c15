//! Username/password authentication toward the upstream
//!
//! Implements the client side of RFC 1929 for SOCKS5.

use crate::error::Socks5Error;
use crate::socks::consts::*;
use anyhow::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Authentication result code for success
const AUTH_SUCCESS: u8 = 0x00;

/// Offer exactly one method, username/password, and check the selection
///
/// Sends `{5, 1, 2}` and expects `{5, 2}` back.
pub async fn negotiate_upstream_method<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(&[SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_PASSWORD])
        .await?;
    stream.flush().await?;

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await?;

    if reply[0] != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(reply[0]).into());
    }
    if reply[1] != SOCKS5_AUTH_METHOD_PASSWORD {
        return Err(Socks5Error::NoAcceptableMethod(reply[1]).into());
    }

    Ok(())
}

/// Build the RFC 1929 request
///
/// ```text
/// +----+------+----------+------+----------+
/// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
/// +----+------+----------+------+----------+
/// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
/// +----+------+----------+------+----------+
/// ```
///
/// Fields longer than 255 bytes are rejected rather than truncated.
pub fn build_auth_request(username: &str, password: &str) -> Result<Vec<u8>, Socks5Error> {
    for (field, value) in [("username", username), ("password", password)] {
        if value.len() > MAX_FIELD_LEN {
            return Err(Socks5Error::FieldTooLong {
                field,
                len: value.len(),
            });
        }
    }

    let mut request = Vec::with_capacity(3 + username.len() + password.len());
    request.push(SOCKS5_AUTH_VERSION);
    request.push(username.len() as u8);
    request.extend_from_slice(username.as_bytes());
    request.push(password.len() as u8);
    request.extend_from_slice(password.as_bytes());
    Ok(request)
}

/// Run method negotiation and username/password sub-negotiation
///
/// A non-zero status in the server response fails with
/// [`Socks5Error::UpstreamAuthFailed`]; there is no retry.
///
/// ```text
/// +----+--------+
/// |VER | STATUS |
/// +----+--------+
/// | 1  |   1    |
/// +----+--------+
/// ```
pub async fn authenticate_upstream<S>(stream: &mut S, username: &str, password: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = build_auth_request(username, password)?;

    negotiate_upstream_method(stream).await?;

    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await?;

    if reply[1] != AUTH_SUCCESS {
        return Err(Socks5Error::UpstreamAuthFailed(reply[1]).into());
    }

    debug!("Upstream authentication successful for user: {}", username);
    Ok(())
}
