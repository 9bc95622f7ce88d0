//! Accept loop for inspector-side connections
//!
//! `Acceptor` listens on a TCP port and hands every accepted stream, wrapped
//! in a `Connection`, to a caller-supplied handler running in its own task.
//! The loop never waits on a handler, and a handler that fails or panics is
//! logged without affecting the listener or other connections.
//!
//! # Stopping
//!
//! `AcceptorHandle::stop()` clears the running flag and cancels a token the
//! loop selects on, so a stop issued while `accept()` is pending takes effect
//! immediately instead of after the next inbound connection.
//!
//! # Usage
//!
//! ```ignore
//! let acceptor = Acceptor::bind("127.0.0.1", 8081).await?;
//! let handle = acceptor.handle();
//!
//! tokio::spawn(acceptor.run(|mut conn, peer| async move {
//!     let frame = conn.receive().await?;
//!     tracing::info!(%peer, frame_type = %frame.frame_type, "got frame");
//!     Ok(())
//! }));
//!
//! handle.stop();
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::connection::Connection;
use crate::error::ProtocolError;

/// Listener that spawns one handler task per accepted connection
#[derive(Debug)]
pub struct Acceptor {
    /// Bound listener
    listener: TcpListener,
    /// Resolved local address (port 0 resolved to the real port)
    local_addr: SocketAddr,
    /// Running flag, checked after every accept
    running: Arc<AtomicBool>,
    /// Cancels a pending accept
    cancel: CancellationToken,
    /// Connection counters
    stats: Arc<AcceptorStats>,
}

/// Cloneable handle used to stop a running acceptor
#[derive(Debug, Clone)]
pub struct AcceptorHandle {
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    stats: Arc<AcceptorStats>,
}

impl AcceptorHandle {
    /// Stop accepting new connections
    ///
    /// Handlers already running are not interrupted.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.cancel.cancel();
    }

    /// Check if the accept loop is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get connection statistics
    pub fn stats(&self) -> AcceptorSnapshot {
        self.stats.snapshot()
    }
}

impl Acceptor {
    /// Bind a listener on `address:port`
    ///
    /// Port 0 picks a free port; see `local_addr()`.
    pub async fn bind(address: &str, port: u16) -> Result<Self> {
        let bind_addr = format!("{address}:{port}");
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| ProtocolError::Bind {
                address: bind_addr.clone(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            running: Arc::new(AtomicBool::new(true)),
            cancel: CancellationToken::new(),
            stats: Arc::new(AcceptorStats::default()),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for stopping the loop from elsewhere
    pub fn handle(&self) -> AcceptorHandle {
        AcceptorHandle {
            running: Arc::clone(&self.running),
            cancel: self.cancel.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Stop accepting new connections
    pub fn stop(&self) {
        self.handle().stop();
    }

    /// Run the accept loop until stopped
    ///
    /// `handler` is invoked once per connection, in a fresh task, and owns
    /// the connection for its whole lifetime.
    pub async fn run<F, Fut>(self, handler: F) -> Result<()>
    where
        F: Fn(Connection<TcpStream>, SocketAddr) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler = Arc::new(handler);

        info!(address = %self.local_addr, "inspector acceptor listening");

        while self.running.load(Ordering::Relaxed) {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    break;
                }

                accept_result = self.listener.accept() => {
                    if !self.running.load(Ordering::Relaxed) {
                        break;
                    }
                    match accept_result {
                        Ok((stream, peer)) => {
                            self.stats.connection_opened();
                            self.spawn_handler(stream, peer, Arc::clone(&handler));
                        }
                        Err(e) => {
                            warn!(error = %e, "accept error");
                            self.stats.accept_error();
                        }
                    }
                }
            }
        }

        self.running.store(false, Ordering::Relaxed);
        info!(address = %self.local_addr, "inspector acceptor stopped");

        Ok(())
    }

    /// Run the accept loop in a background task
    pub fn spawn<F, Fut>(self, handler: F) -> tokio::task::JoinHandle<Result<()>>
    where
        F: Fn(Connection<TcpStream>, SocketAddr) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        tokio::spawn(self.run(handler))
    }

    fn spawn_handler<F, Fut>(&self, stream: TcpStream, peer: SocketAddr, handler: Arc<F>)
    where
        F: Fn(Connection<TcpStream>, SocketAddr) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "failed to set TCP_NODELAY");
        }

        debug!(peer = %peer, "connection accepted");

        let stats = Arc::clone(&self.stats);
        let connection = Connection::new(stream);

        // The inner task isolates handler panics; the outer one reports them.
        tokio::spawn(async move {
            let task = tokio::spawn(handler(connection, peer));
            match task.await {
                Ok(Ok(())) => debug!(peer = %peer, "connection handler finished"),
                Ok(Err(e)) => debug!(peer = %peer, error = %e, "connection handler ended with error"),
                Err(e) if e.is_panic() => {
                    warn!(peer = %peer, "connection handler panicked");
                    stats.handler_panicked();
                }
                Err(_) => debug!(peer = %peer, "connection handler cancelled"),
            }
            stats.connection_closed();
        });
    }
}

/// Connection counters for an acceptor
#[derive(Debug, Default)]
struct AcceptorStats {
    accepted: AtomicU64,
    active: AtomicU64,
    accept_errors: AtomicU64,
    handler_panics: AtomicU64,
}

impl AcceptorStats {
    #[inline]
    fn connection_opened(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn connection_closed(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    fn accept_error(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn handler_panicked(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> AcceptorSnapshot {
        AcceptorSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            accept_errors: self.accept_errors.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time acceptor statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptorSnapshot {
    /// Connections accepted since start
    pub accepted: u64,
    /// Connections whose handler is still running
    pub active: u64,
    /// Failed accept calls
    pub accept_errors: u64,
    /// Handlers that panicked
    pub handler_panics: u64,
}
