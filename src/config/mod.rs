//! Configuration module for socks5-chain
//!
//! This module provides the resolved [`ConnectionParams`] shared by every
//! relay handler, and the [`CredentialStore`] that persists the upstream
//! settings (host/port in clear, credentials sealed with a passphrase).

pub mod crypto;
mod store;

pub use store::{ConfigInput, CredentialStore, CONFIG_DIR_NAME, CREDENTIALS_FILE, HOST_FILE};

use crate::error::ConfigError;
use crate::helper::{DEFAULT_LOCAL_HOST, DEFAULT_LOCAL_PORT};
use std::fmt;

/// Maximum length of an RFC 1929 username or password
pub const MAX_CREDENTIAL_LEN: usize = 255;

/// Fully resolved parameters the relay runs with
///
/// Immutable once the server starts; handlers share one instance read-only.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Upstream SOCKS5 proxy hostname
    pub upstream_host: String,
    /// Upstream SOCKS5 proxy port
    pub upstream_port: u16,
    /// Username for upstream authentication
    pub username: String,
    /// Password for upstream authentication
    pub password: String,
    /// Local address to bind
    pub local_host: String,
    /// Local port to bind
    pub local_port: u16,
}

impl ConnectionParams {
    /// Address of the upstream proxy as `host:port`
    pub fn upstream_addr(&self) -> String {
        join_host_port(&self.upstream_host, self.upstream_port)
    }

    /// Local listen address as `host:port`
    pub fn local_addr(&self) -> String {
        join_host_port(&self.local_host, self.local_port)
    }

    /// Check that every required field is populated and fits the wire format
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream_host.is_empty() {
            return Err(ConfigError::MissingField("upstream host"));
        }
        if self.upstream_port == 0 {
            return Err(ConfigError::MissingField("upstream port"));
        }
        if self.username.is_empty() {
            return Err(ConfigError::MissingField("username"));
        }
        if self.password.is_empty() {
            return Err(ConfigError::MissingField("password"));
        }
        for (field, value) in [("username", &self.username), ("password", &self.password)] {
            if value.len() > MAX_CREDENTIAL_LEN {
                return Err(ConfigError::CredentialTooLong {
                    field,
                    len: value.len(),
                });
            }
        }
        Ok(())
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            upstream_host: String::new(),
            upstream_port: 0,
            username: String::new(),
            password: String::new(),
            local_host: DEFAULT_LOCAL_HOST.to_string(),
            local_port: DEFAULT_LOCAL_PORT,
        }
    }
}

// Password stays out of logs.
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("upstream_host", &self.upstream_host)
            .field("upstream_port", &self.upstream_port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("local_host", &self.local_host)
            .field("local_port", &self.local_port)
            .finish()
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_params() -> ConnectionParams {
        ConnectionParams {
            upstream_host: "proxy.example.com".to_string(),
            upstream_port: 1080,
            username: "testuser".to_string(),
            password: "testpass".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_local_bind() {
        let params = ConnectionParams::default();
        assert_eq!(params.local_addr(), "127.0.0.1:1080");
    }

    #[test]
    fn test_upstream_addr() {
        let params = create_test_params();
        assert_eq!(params.upstream_addr(), "proxy.example.com:1080");

        let params = ConnectionParams {
            upstream_host: "::1".to_string(),
            ..create_test_params()
        };
        assert_eq!(params.upstream_addr(), "[::1]:1080");
    }

    #[test]
    fn test_validate_ok() {
        assert!(create_test_params().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_fields() {
        let cases = [
            (
                ConnectionParams {
                    upstream_host: String::new(),
                    ..create_test_params()
                },
                "upstream host",
            ),
            (
                ConnectionParams {
                    upstream_port: 0,
                    ..create_test_params()
                },
                "upstream port",
            ),
            (
                ConnectionParams {
                    username: String::new(),
                    ..create_test_params()
                },
                "username",
            ),
            (
                ConnectionParams {
                    password: String::new(),
                    ..create_test_params()
                },
                "password",
            ),
        ];

        for (params, expected) in cases {
            match params.validate() {
                Err(ConfigError::MissingField(field)) => assert_eq!(field, expected),
                other => panic!("expected MissingField({}), got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn test_validate_rejects_long_credentials() {
        let params = ConnectionParams {
            password: "x".repeat(256),
            ..create_test_params()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::CredentialTooLong {
                field: "password",
                len: 256
            })
        ));

        let params = ConnectionParams {
            username: "u".repeat(255),
            ..create_test_params()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug_str = format!("{:?}", create_test_params());
        assert!(debug_str.contains("testuser"));
        assert!(!debug_str.contains("testpass"));
    }
}
