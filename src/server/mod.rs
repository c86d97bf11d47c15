//! Server lifecycle controller
//!
//! [`RelayServer`] owns the listening socket, a cancellation token and a
//! tracker for in-flight connection handlers. It moves through
//! `Created -> Listening -> ShuttingDown -> Stopped` and never goes back.

use crate::config::ConnectionParams;
use crate::error::ChainError;
use crate::helper::{duration_from_secs, DEFAULT_SHUTDOWN_GRACE_SECS};
use crate::socks::handle_socks5_on_stream;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Pause after a failed accept before trying again
const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(100);

/// Lifecycle state of a [`RelayServer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Constructed, nothing bound yet
    Created,
    /// Listener bound; accepting once `serve` runs
    Listening,
    /// `stop` is draining in-flight handlers
    ShuttingDown,
    /// Terminal state
    Stopped,
}

/// Local SOCKS5 listener chaining every connection to the upstream proxy
pub struct RelayServer {
    params: Arc<ConnectionParams>,
    state: Mutex<ServerState>,
    listener: Mutex<Option<TcpListener>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    grace_period: Duration,
}

impl RelayServer {
    /// Create a server for the given resolved parameters
    pub fn new(params: ConnectionParams) -> Self {
        RelayServer {
            params: Arc::new(params),
            state: Mutex::new(ServerState::Created),
            listener: Mutex::new(None),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            grace_period: duration_from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }

    /// Override how long `stop` waits for in-flight handlers
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Connection parameters shared by every handler
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ServerState {
        *self.state.lock().await
    }

    /// Number of connection handlers still running
    pub fn active_connections(&self) -> usize {
        self.tracker.len()
    }

    /// Bind the listening socket and return its local address
    ///
    /// Binding to port 0 picks a free port. Fails with
    /// [`ChainError::AlreadyListening`] if a listener is already bound and
    /// with [`ChainError::Stopped`] once the server has been stopped.
    pub async fn bind(&self, addr: &str) -> Result<SocketAddr, ChainError> {
        self.check_bindable().await?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ChainError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        // A concurrent bind or stop may have won while we were binding.
        let mut state = self.state.lock().await;
        match *state {
            ServerState::Created => {}
            ServerState::Listening => return Err(ChainError::AlreadyListening),
            ServerState::ShuttingDown | ServerState::Stopped => return Err(ChainError::Stopped),
        }
        *self.listener.lock().await = Some(listener);
        *state = ServerState::Listening;

        info!("Listening on {}", local_addr);
        Ok(local_addr)
    }

    /// Accept connections until [`RelayServer::stop`] is called
    ///
    /// Each connection runs on its own tracked task. Accept errors are logged
    /// and the loop keeps going. Returns `Ok` right away if the server has
    /// already been stopped.
    pub async fn serve(&self) -> Result<(), ChainError> {
        let bound = self.listener.lock().await.take();
        let listener = match bound {
            Some(listener) => listener,
            None => {
                return match *self.state.lock().await {
                    ServerState::Created => Err(ChainError::NotBound),
                    ServerState::Listening => Err(ChainError::AlreadyListening),
                    ServerState::ShuttingDown | ServerState::Stopped => Ok(()),
                };
            }
        };

        info!(
            "Relaying to upstream {} as {}",
            self.params.upstream_addr(),
            self.params.username
        );

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Accept loop cancelled");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            if let Err(e) = stream.set_nodelay(true) {
                                warn!("Failed to set TCP_NODELAY for {}: {}", peer, e);
                            }
                            debug!("Accepted connection from {}", peer);

                            let params = Arc::clone(&self.params);
                            self.tracker.spawn(async move {
                                if let Err(e) = handle_socks5_on_stream(stream, &params).await {
                                    warn!("Connection from {} failed: {:#}", peer, e);
                                }
                                debug!("Connection from {} closed", peer);
                            });
                        }
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                            if self.pause_after_accept_error().await {
                                debug!("Accept loop cancelled");
                                break;
                            }
                        }
                    }
                }
            }
        }

        drop(listener);
        info!("Listener closed");
        Ok(())
    }

    /// Bind to `addr` and serve until stopped
    ///
    /// A no-op returning `Ok` once the server has been stopped.
    pub async fn start(&self, addr: &str) -> Result<(), ChainError> {
        match self.bind(addr).await {
            Ok(_) => self.serve().await,
            Err(ChainError::Stopped) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Stop accepting and wait for in-flight handlers
    ///
    /// The wait is bounded by the grace period; handlers still running after
    /// it are left alone. Calling `stop` again is a no-op.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().await;
            match *state {
                ServerState::ShuttingDown | ServerState::Stopped => return,
                ServerState::Created | ServerState::Listening => {
                    *state = ServerState::ShuttingDown;
                }
            }
        }

        info!("Stopping server");
        self.cancel.cancel();
        // Closes a listener that was bound but never served.
        drop(self.listener.lock().await.take());
        self.tracker.close();

        if tokio::time::timeout(self.grace_period, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                "Shutdown grace period of {:?} elapsed with {} connection(s) still active",
                self.grace_period,
                self.tracker.len()
            );
        }

        *self.state.lock().await = ServerState::Stopped;
        info!("Server stopped");
    }

    /// Wait out the accept error delay; returns `true` if cancelled meanwhile
    async fn pause_after_accept_error(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(ACCEPT_ERROR_DELAY) => false,
        }
    }

    async fn check_bindable(&self) -> Result<(), ChainError> {
        match *self.state.lock().await {
            ServerState::Created => Ok(()),
            ServerState::Listening => Err(ChainError::AlreadyListening),
            ServerState::ShuttingDown | ServerState::Stopped => Err(ChainError::Stopped),
        }
    }
}
