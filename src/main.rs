//! socks5-chain - SOCKS5 to SOCKS5 relay
//!
//! This is the main entry point for the socks5-chain application.

use anyhow::{Context, Result};
use clap::Parser;
use socks5_chain::config::{ConfigInput, CredentialStore};
use socks5_chain::error::ConfigError;
use socks5_chain::helper::{non_empty, DEFAULT_LOCAL_HOST, DEFAULT_LOCAL_PORT};
use socks5_chain::server::RelayServer;
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, Level};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::FmtSubscriber;

/// Whether typed input is shown on the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Echo {
    Visible,
    Hidden,
}

const USERNAME_PROMPT: (&str, Echo) = ("Enter upstream username: ", Echo::Visible);
const PASSWORD_PROMPT: (&str, Echo) = ("Enter upstream password: ", Echo::Hidden);
const NEW_PASSPHRASE_PROMPT: (&str, Echo) = (
    "Enter encryption password to protect credentials: ",
    Echo::Hidden,
);
const PASSPHRASE_PROMPT: (&str, Echo) = (
    "Enter encryption password to decrypt credentials: ",
    Echo::Hidden,
);

/// socks5-chain - local SOCKS5 proxy chained to an authenticated upstream
#[derive(Parser, Debug)]
#[command(name = "socks5-chain")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Upstream SOCKS5 username
    #[arg(long, env = "UPSTREAM_USERNAME")]
    username: Option<String>,

    /// Upstream SOCKS5 password
    #[arg(long, env = "UPSTREAM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Passphrase protecting the stored credentials
    #[arg(long, env = "SOCKS5CHAIN_PASSWORD", hide_env_values = true)]
    encpass: Option<String>,

    /// Upstream SOCKS5 proxy hostname
    #[arg(long)]
    upstream_host: Option<String>,

    /// Upstream SOCKS5 proxy port
    #[arg(long)]
    upstream_port: Option<u16>,

    /// Local host to bind
    #[arg(long, default_value = DEFAULT_LOCAL_HOST)]
    local_host: String,

    /// Local port to bind
    #[arg(long, default_value_t = DEFAULT_LOCAL_PORT)]
    local_port: u16,

    /// Directory holding the stored configuration
    #[arg(long, env = "SOCKS5CHAIN_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Append logs to this file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,

    /// Prompt for credentials and the encryption passphrase
    #[arg(long)]
    configure: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_log, args.log_file.as_deref())?;

    info!("socks5-chain v{}", socks5_chain::VERSION);

    let store = match &args.config_dir {
        Some(dir) => CredentialStore::new(dir),
        None => CredentialStore::default_location()?,
    };
    info!("Configuration directory: {:?}", store.dir());

    let mut input = ConfigInput {
        username: non_empty(args.username.clone()),
        password: non_empty(args.password.clone()),
        upstream_host: non_empty(args.upstream_host.clone()),
        upstream_port: args.upstream_port,
        local_host: Some(args.local_host.clone()),
        local_port: Some(args.local_port),
    };
    let mut passphrase = non_empty(args.encpass.clone());

    if args.configure {
        input.username = Some(ask(USERNAME_PROMPT)?);
        input.password = Some(ask(PASSWORD_PROMPT)?);
        passphrase = Some(ask(NEW_PASSPHRASE_PROMPT)?);
    }

    let params = match store.resolve(&input, passphrase.as_deref()) {
        Err(ConfigError::PassphraseRequired) => {
            let passphrase = ask(PASSPHRASE_PROMPT)?;
            store.resolve(&input, Some(&passphrase))?
        }
        result => result?,
    };
    info!("Upstream: {} as {}", params.upstream_addr(), params.username);

    let local_addr = params.local_addr();
    let server = Arc::new(RelayServer::new(params));
    server.bind(&local_addr).await?;

    let serving = Arc::clone(&server);
    let mut serve_handle = tokio::spawn(async move { serving.serve().await });

    tokio::select! {
        result = &mut serve_handle => {
            let result = result.with_context(|| "Server task failed")?;
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        result = shutdown_signal() => {
            result?;
            server.stop().await;
            serve_handle
                .await
                .with_context(|| "Server task failed")??;
            info!("Server shutdown complete");
        }
    }

    Ok(())
}

/// Wait for Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())
            .with_context(|| "Failed to setup SIGTERM handler")?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down...");
    }

    Ok(())
}

/// Ask for one value, hiding the input for secrets
fn ask((message, echo): (&str, Echo)) -> Result<String> {
    match echo {
        Echo::Visible => prompt(message),
        Echo::Hidden => {
            rpassword::prompt_password(message).with_context(|| "Failed to read from terminal")
        }
    }
}

/// Print `message` and read one trimmed line from stdin
fn prompt(message: &str) -> Result<String> {
    let mut stdout = std::io::stdout();
    stdout.write_all(message.as_bytes())?;
    stdout.flush()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .with_context(|| "Failed to read from terminal")?;
    Ok(line.trim().to_string())
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool, log_file: Option<&Path>) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let (writer, ansi) = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stdout), true),
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(writer)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
