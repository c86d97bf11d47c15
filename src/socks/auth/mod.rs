//! SOCKS5 authentication module
//!
//! The inbound side always settles on "no authentication". The upstream side
//! always offers username/password only (see [`password`]).

mod password;

pub use password::{authenticate_upstream, build_auth_request, negotiate_upstream_method};

use super::consts::*;
use crate::error::Socks5Error;
use anyhow::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Accept the client's method negotiation and select "no authentication"
///
/// Reads `VER NMETHODS METHODS...` and replies `{5, 0}`. The offered method
/// list is read but not inspected. Nothing is written on a version mismatch.
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
pub async fn accept_no_auth<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf).await?;

    let version = buf[0];
    let num_methods = buf[1];

    if version != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(version).into());
    }

    let mut methods = vec![0u8; num_methods as usize];
    stream.read_exact(&mut methods).await?;
    tracing::trace!("Client offered methods {:?}", methods);

    stream
        .write_all(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NONE])
        .await?;
    stream.flush().await?;

    Ok(())
}
