//! Error types for socks5-chain
//!
//! This module defines the closed error sets used throughout the relay:
//! protocol violations and upstream rejections ([`Socks5Error`]), startup
//! configuration failures ([`ConfigError`]) and listener lifecycle failures
//! ([`ChainError`]).

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for socks5-chain operations
#[derive(Error, Debug)]
pub enum ChainError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The listening socket could not be bound
    #[error("Failed to start listener on {addr}: {source}")]
    Bind {
        /// Requested bind address
        addr: String,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// The server is already accepting connections
    #[error("Server is already listening")]
    AlreadyListening,

    /// `serve` was called without a successful `bind`
    #[error("Server has no bound listener")]
    NotBound,

    /// The server has been stopped and cannot be restarted
    #[error("Server has been stopped")]
    Stopped,
}

/// SOCKS5 specific errors
///
/// Covers malformed bytes from either peer and rejections reported by the
/// upstream proxy. All of them are fatal to a single connection only.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Socks5Error {
    /// Unsupported SOCKS version
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Address type not supported
    #[error("Address type not supported: {0}")]
    AddressTypeNotSupported(u8),

    /// The upstream did not select username/password authentication
    #[error("Upstream selected unacceptable authentication method: {0:#04x}")]
    NoAcceptableMethod(u8),

    /// The upstream rejected our credentials
    #[error("Upstream authentication failed (status {0})")]
    UpstreamAuthFailed(u8),

    /// The upstream refused the CONNECT request
    #[error("Upstream connection failed: {code} ({})", describe_reply_code(.code))]
    UpstreamConnectFailed {
        /// Reply code reported by the upstream
        code: u8,
    },

    /// Username, password or target host does not fit a one-byte length prefix
    #[error("{field} is {len} bytes long, limit is 255")]
    FieldTooLong {
        /// Which field overflowed
        field: &'static str,
        /// Actual length in bytes
        len: usize,
    },
}

/// Configuration and credential store errors
///
/// [`ConfigError::PassphraseRequired`] is deliberately distinct from
/// [`ConfigError::DecryptFailed`] so front-ends can re-prompt instead of
/// aborting.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Encrypted credentials exist on disk but no passphrase was supplied
    #[error("Encryption passphrase required to decrypt existing credentials")]
    PassphraseRequired,

    /// Wrong passphrase or corrupted credential file
    #[error("Failed to decrypt credentials: {0}")]
    DecryptFailed(String),

    /// A required connection parameter is empty
    #[error("{0} is required")]
    MissingField(&'static str),

    /// A credential exceeds the RFC 1929 length limit
    #[error("{field} is {len} bytes long, limit is 255")]
    CredentialTooLong {
        /// Which field overflowed
        field: &'static str,
        /// Actual length in bytes
        len: usize,
    },

    /// A stored record could not be parsed or serialized
    #[error("Invalid record {path:?}: {reason}")]
    InvalidRecord {
        /// Record location
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// No home directory to place the configuration directory in
    #[error("Cannot determine configuration directory (HOME is not set)")]
    NoConfigDir,

    /// Filesystem error while reading or writing the store
    #[error("Failed to access {path:?}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks5ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl Socks5ReplyCode {
    /// Human readable meaning of the reply code
    pub fn description(self) -> &'static str {
        match self {
            Socks5ReplyCode::Succeeded => "succeeded",
            Socks5ReplyCode::GeneralFailure => "general SOCKS server failure",
            Socks5ReplyCode::ConnectionNotAllowed => "connection not allowed by ruleset",
            Socks5ReplyCode::NetworkUnreachable => "network unreachable",
            Socks5ReplyCode::HostUnreachable => "host unreachable",
            Socks5ReplyCode::ConnectionRefused => "connection refused",
            Socks5ReplyCode::TtlExpired => "TTL expired",
            Socks5ReplyCode::CommandNotSupported => "command not supported",
            Socks5ReplyCode::AddressTypeNotSupported => "address type not supported",
        }
    }
}

impl From<Socks5ReplyCode> for u8 {
    fn from(code: Socks5ReplyCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for Socks5ReplyCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Socks5ReplyCode::Succeeded),
            0x01 => Ok(Socks5ReplyCode::GeneralFailure),
            0x02 => Ok(Socks5ReplyCode::ConnectionNotAllowed),
            0x03 => Ok(Socks5ReplyCode::NetworkUnreachable),
            0x04 => Ok(Socks5ReplyCode::HostUnreachable),
            0x05 => Ok(Socks5ReplyCode::ConnectionRefused),
            0x06 => Ok(Socks5ReplyCode::TtlExpired),
            0x07 => Ok(Socks5ReplyCode::CommandNotSupported),
            0x08 => Ok(Socks5ReplyCode::AddressTypeNotSupported),
            other => Err(other),
        }
    }
}

fn describe_reply_code(code: &u8) -> &'static str {
    Socks5ReplyCode::try_from(*code)
        .map(Socks5ReplyCode::description)
        .unwrap_or("unassigned")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socks5_reply_code_from_u8_valid() {
        assert_eq!(
            Socks5ReplyCode::try_from(0x00).unwrap(),
            Socks5ReplyCode::Succeeded
        );
        assert_eq!(
            Socks5ReplyCode::try_from(0x05).unwrap(),
            Socks5ReplyCode::ConnectionRefused
        );
        assert_eq!(
            Socks5ReplyCode::try_from(0x08).unwrap(),
            Socks5ReplyCode::AddressTypeNotSupported
        );
    }

    #[test]
    fn test_socks5_reply_code_from_u8_invalid() {
        assert_eq!(Socks5ReplyCode::try_from(0xFF), Err(0xFF));
        assert_eq!(Socks5ReplyCode::try_from(0x09), Err(0x09));
    }

    #[test]
    fn test_socks5_reply_code_to_u8() {
        assert_eq!(u8::from(Socks5ReplyCode::Succeeded), 0x00);
        assert_eq!(u8::from(Socks5ReplyCode::HostUnreachable), 0x04);
        assert_eq!(u8::from(Socks5ReplyCode::CommandNotSupported), 0x07);
    }

    #[test]
    fn test_upstream_connect_failed_display() {
        let err = Socks5Error::UpstreamConnectFailed { code: 5 };
        assert_eq!(
            err.to_string(),
            "Upstream connection failed: 5 (connection refused)"
        );

        let err = Socks5Error::UpstreamConnectFailed { code: 0x42 };
        assert_eq!(err.to_string(), "Upstream connection failed: 66 (unassigned)");
    }

    #[test]
    fn test_socks5_error_display() {
        let err = Socks5Error::UnsupportedVersion(4);
        assert_eq!(format!("{}", err), "Unsupported SOCKS version: 4");

        let err = Socks5Error::AddressTypeNotSupported(0x05);
        assert_eq!(format!("{}", err), "Address type not supported: 5");

        let err = Socks5Error::NoAcceptableMethod(0xFF);
        assert_eq!(
            format!("{}", err),
            "Upstream selected unacceptable authentication method: 0xff"
        );

        let err = Socks5Error::UpstreamAuthFailed(1);
        assert_eq!(format!("{}", err), "Upstream authentication failed (status 1)");
    }

    #[test]
    fn test_config_error_messages_are_distinct() {
        let need = ConfigError::PassphraseRequired.to_string();
        let wrong = ConfigError::DecryptFailed("authentication tag mismatch".into()).to_string();
        let missing = ConfigError::MissingField("upstream host").to_string();

        assert!(need.contains("passphrase required"));
        assert!(wrong.contains("Failed to decrypt"));
        assert_eq!(missing, "upstream host is required");
    }

    #[test]
    fn test_chain_error_messages() {
        let err: ChainError = io::Error::new(io::ErrorKind::Other, "io error").into();
        assert!(matches!(err, ChainError::Io(_)));

        let err = ChainError::Bind {
            addr: "127.0.0.1:1080".to_string(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(err.to_string(), "Failed to start listener on 127.0.0.1:1080: in use");
        assert_eq!(ChainError::Stopped.to_string(), "Server has been stopped");
    }
}
