//! Persistent credential store
//!
//! Two records share one directory:
//!
//! - `upstream.toml` holds the upstream host and port in clear text
//! - `credentials.enc` holds username, password, host and port, TOML encoded
//!   and sealed with [`crypto::encrypt`](super::crypto::encrypt)

use super::crypto;
use super::ConnectionParams;
use crate::error::ConfigError;
use crate::helper::{non_empty, DEFAULT_LOCAL_HOST, DEFAULT_LOCAL_PORT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{DirBuilder, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the configuration directory under the user's home
pub const CONFIG_DIR_NAME: &str = ".socks5-chain";

/// File name of the plaintext host record
pub const HOST_FILE: &str = "upstream.toml";

/// File name of the encrypted credential record
pub const CREDENTIALS_FILE: &str = "credentials.enc";

/// Values supplied by a front-end for one resolution
///
/// `None` and empty strings both mean "not supplied"; supplied values
/// override whatever is loaded from disk.
#[derive(Clone, Default)]
pub struct ConfigInput {
    /// Upstream username
    pub username: Option<String>,
    /// Upstream password
    pub password: Option<String>,
    /// Upstream proxy hostname
    pub upstream_host: Option<String>,
    /// Upstream proxy port
    pub upstream_port: Option<u16>,
    /// Local bind host, defaults to `127.0.0.1`
    pub local_host: Option<String>,
    /// Local bind port, defaults to `1080`
    pub local_port: Option<u16>,
}

impl fmt::Debug for ConfigInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigInput")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("upstream_host", &self.upstream_host)
            .field("upstream_port", &self.upstream_port)
            .field("local_host", &self.local_host)
            .field("local_port", &self.local_port)
            .finish()
    }
}

/// Plaintext host record
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct HostRecord {
    upstream_host: String,
    upstream_port: u16,
}

/// Record sealed inside `credentials.enc`
#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct CredentialRecord {
    username: String,
    password: String,
    upstream_host: String,
    upstream_port: u16,
}

/// On-disk store for upstream settings and sealed credentials
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    /// Create a store rooted at `dir`
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in `$HOME/.socks5-chain` (`%USERPROFILE%` on Windows)
    pub fn default_location() -> Result<Self, ConfigError> {
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::new(PathBuf::from(home).join(CONFIG_DIR_NAME)))
    }

    /// Directory holding both records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn host_path(&self) -> PathBuf {
        self.dir.join(HOST_FILE)
    }

    fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    /// Whether an encrypted credential record exists
    pub fn credentials_exist(&self) -> bool {
        self.credentials_path().is_file()
    }

    /// Create the store directory (mode 0700 on unix) if missing
    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&self.dir).map_err(|source| ConfigError::Io {
            path: self.dir.clone(),
            source,
        })
    }

    /// Merge stored state with `input` into complete connection parameters
    ///
    /// When a credential record exists a passphrase is mandatory, otherwise
    /// [`ConfigError::PassphraseRequired`] is returned so the caller can ask
    /// for one. On success the host record is always rewritten, and the
    /// credential record is rewritten only when a passphrase was supplied.
    pub fn resolve(
        &self,
        input: &ConfigInput,
        passphrase: Option<&str>,
    ) -> Result<ConnectionParams, ConfigError> {
        self.ensure_dir()?;
        let passphrase = passphrase.filter(|p| !p.is_empty());

        let mut params = ConnectionParams {
            local_host: non_empty(input.local_host.clone())
                .unwrap_or_else(|| DEFAULT_LOCAL_HOST.to_string()),
            local_port: input.local_port.unwrap_or(DEFAULT_LOCAL_PORT),
            ..Default::default()
        };

        if self.credentials_exist() {
            let passphrase = passphrase.ok_or(ConfigError::PassphraseRequired)?;
            let record = self.load_credentials(passphrase)?;
            debug!("Loaded encrypted credentials from {:?}", self.credentials_path());
            params.username = record.username;
            params.password = record.password;
            params.upstream_host = record.upstream_host;
            params.upstream_port = record.upstream_port;
        }

        if let Some(host) = self.load_host_record()? {
            if params.upstream_host.is_empty() {
                params.upstream_host = host.upstream_host;
            }
            if params.upstream_port == 0 {
                params.upstream_port = host.upstream_port;
            }
        }

        if let Some(host) = non_empty(input.upstream_host.clone()) {
            params.upstream_host = host;
        }
        if let Some(port) = input.upstream_port.filter(|p| *p != 0) {
            params.upstream_port = port;
        }
        if let Some(username) = non_empty(input.username.clone()) {
            params.username = username;
        }
        if let Some(password) = non_empty(input.password.clone()) {
            params.password = password;
        }

        params.validate()?;
        self.persist(&params, passphrase)?;

        Ok(params)
    }

    /// Persist `params`; credentials are written only with a passphrase
    pub fn save(
        &self,
        params: &ConnectionParams,
        passphrase: Option<&str>,
    ) -> Result<(), ConfigError> {
        params.validate()?;
        self.ensure_dir()?;
        self.persist(params, passphrase.filter(|p| !p.is_empty()))
    }

    fn persist(
        &self,
        params: &ConnectionParams,
        passphrase: Option<&str>,
    ) -> Result<(), ConfigError> {
        let host = HostRecord {
            upstream_host: params.upstream_host.clone(),
            upstream_port: params.upstream_port,
        };
        let path = self.host_path();
        let text = toml::to_string(&host).map_err(|e| ConfigError::InvalidRecord {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        write_private(&path, text.as_bytes())?;
        debug!("Saved upstream host record to {:?}", path);

        if let Some(passphrase) = passphrase {
            let record = CredentialRecord {
                username: params.username.clone(),
                password: params.password.clone(),
                upstream_host: params.upstream_host.clone(),
                upstream_port: params.upstream_port,
            };
            let path = self.credentials_path();
            let text = toml::to_string(&record).map_err(|e| ConfigError::InvalidRecord {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            let sealed = crypto::encrypt(text.as_bytes(), passphrase).map_err(|e| {
                ConfigError::InvalidRecord {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?;
            write_private(&path, sealed.as_bytes())?;
            debug!("Saved encrypted credentials to {:?}", path);
        }

        Ok(())
    }

    fn load_credentials(&self, passphrase: &str) -> Result<CredentialRecord, ConfigError> {
        let path = self.credentials_path();
        let sealed = read_file(&path)?;
        let plain = crypto::decrypt(&sealed, passphrase)
            .map_err(|e| ConfigError::DecryptFailed(e.to_string()))?;
        let text = String::from_utf8(plain)
            .map_err(|e| ConfigError::DecryptFailed(format!("record is not UTF-8: {}", e)))?;
        toml::from_str(&text)
            .map_err(|e| ConfigError::DecryptFailed(format!("malformed record: {}", e)))
    }

    fn load_host_record(&self) -> Result<Option<HostRecord>, ConfigError> {
        let path = self.host_path();
        if !path.is_file() {
            return Ok(None);
        }
        let text = read_file(&path)?;
        toml::from_str(&text)
            .map(Some)
            .map_err(|e| ConfigError::InvalidRecord {
                path,
                reason: e.to_string(),
            })
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_private(path: &Path, contents: &[u8]) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(io_err)?;
    // The open mode only applies to newly created files.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(io_err)?;
    }
    file.write_all(contents).map_err(io_err)?;
    file.sync_all().map_err(io_err)
}
