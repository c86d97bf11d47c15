//! SOCKS5 protocol handling
//!
//! The inbound side speaks SOCKS5 without authentication to local clients.
//! The upstream side speaks SOCKS5 with username/password authentication to
//! the configured upstream proxy. [`handle_socks5_on_stream`] chains the two.

mod auth;
mod command;
mod consts;
mod handler;
mod tcp_relay;
mod types;
mod upstream;

pub use auth::{accept_no_auth, authenticate_upstream, build_auth_request, negotiate_upstream_method};
pub use command::{build_reply, parse_command, send_success};
pub use consts::*;
pub use handler::handle_socks5_on_stream;
pub use tcp_relay::relay_tcp;
pub use types::{SocksCommand, TargetAddr};
pub use upstream::{build_connect_request, connect_upstream, send_connect};
