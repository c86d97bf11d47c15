//! Helper utilities for socks5-chain
//!
//! Shared defaults and small conversions used across the crate.

use std::time::Duration;

/// Default local bind host
pub const DEFAULT_LOCAL_HOST: &str = "127.0.0.1";

/// Default local bind port
pub const DEFAULT_LOCAL_PORT: u16 = 1080;

/// How long `stop` waits for in-flight connections, in seconds
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Parse duration from seconds
pub fn duration_from_secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

/// Treat an empty string the same as an absent value
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
