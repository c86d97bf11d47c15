//! # socks5-chain - SOCKS5 to SOCKS5 relay
//!
//! socks5-chain accepts unauthenticated SOCKS5 clients on a local port and
//! forwards every CONNECT through a single upstream SOCKS5 proxy that
//! requires username/password authentication. Upstream credentials live in
//! an AES-GCM sealed file keyed by an operator passphrase.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socks5_chain::config::{ConfigInput, CredentialStore};
//! use socks5_chain::server::RelayServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = CredentialStore::default_location()?;
//!     let params = store.resolve(&ConfigInput::default(), Some("passphrase"))?;
//!     let addr = params.local_addr();
//!
//!     RelayServer::new(params).start(&addr).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SOCKS5 Client -> socks5-chain (no auth) -> Upstream SOCKS5 (user/pass) -> Target
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod helper;
pub mod server;
pub mod socks;

// Re-export commonly used items
pub use config::{ConfigInput, ConnectionParams, CredentialStore};
pub use error::{ChainError, ConfigError, Socks5Error};
pub use server::{RelayServer, ServerState};

/// Version of the socks5-chain library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
