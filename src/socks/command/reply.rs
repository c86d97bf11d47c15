//! SOCKS5 reply builder
//!
//! Constructs the replies sent back to the inbound client. The bound address
//! is always reported as `0.0.0.0:0`; CONNECT clients do not rely on it.

use crate::socks::consts::*;
use anyhow::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Build and send a SOCKS5 reply
///
/// # SOCKS5 Reply Format
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   |    4     |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
pub async fn build_reply<S>(stream: &mut S, reply_code: u8) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&reply_bytes(reply_code)).await?;
    stream.flush().await?;

    Ok(())
}

/// Send the unconditional success reply
pub async fn send_success<S>(stream: &mut S) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    build_reply(stream, SOCKS5_REPLY_SUCCEEDED).await
}

fn reply_bytes(reply_code: u8) -> [u8; SOCKS5_REPLY_LEN] {
    [
        SOCKS5_VERSION,
        reply_code,
        SOCKS5_RESERVED,
        SOCKS5_ADDR_TYPE_IPV4,
        0,
        0,
        0,
        0,
        0,
        0,
    ]
}
