//! Connection acceptor
//!
//! Binds the listening socket, optionally terminates TLS, counts live
//! connections and spawns one handler task per accepted connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::error::AppError;
use crate::handle::ChatHandle;
use crate::handler::{handle_connection, Limits};
use crate::tls;
use crate::types::ConnectionId;

/// Upper bound for a TLS handshake
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed accept, e.g. when out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Counts live connections
#[derive(Debug, Clone, Default)]
pub struct ConnectionCounter {
    active: Arc<AtomicUsize>,
}

impl ConnectionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a new connection until the returned permit is dropped
    pub fn acquire(&self) -> ConnectionPermit {
        let count = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        ConnectionPermit {
            active: Arc::clone(&self.active),
            count,
        }
    }

    /// Connections currently counted
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// One counted connection
#[derive(Debug)]
pub struct ConnectionPermit {
    active: Arc<AtomicUsize>,
    count: usize,
}

impl ConnectionPermit {
    /// Number of connections counted when this one was accepted, itself included
    pub fn count(&self) -> usize {
        self.count
    }

    /// Connections counted right now
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bound listening socket
pub struct Listener {
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    handle: ChatHandle,
    limits: Limits,
    counter: ConnectionCounter,
}

impl Listener {
    /// Validate the configuration and bind
    ///
    /// TLS without a certificate fails here, before any socket is opened.
    pub async fn bind(config: &Config, handle: ChatHandle) -> Result<Self, AppError> {
        config.validate()?;

        let tls = match config.tls_paths() {
            Some((cert, key)) => {
                let acceptor = tls::load_acceptor(cert, key)?;
                info!("TLS enabled with certificate: {}", cert.display());
                Some(acceptor)
            }
            None => None,
        };

        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            error!("Failed to start server on {}: {}", addr, e);
            e
        })?;
        info!("Chat server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            tls,
            handle,
            limits: config.limits(),
            counter: ConnectionCounter::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    /// Connection accept loop
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => self.spawn_connection(stream, peer),
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    /// Spawn handler task for one connection
    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let permit = self.counter.acquire();
        let handle = self.handle.clone();
        let limits = self.limits;
        let tls = self.tls.clone();
        let span = info_span!("connection", id = %ConnectionId::new(), %peer);

        tokio::spawn(
            async move {
                debug!("Accepted, {} connections counted", permit.count());
                let result = match tls {
                    Some(acceptor) => {
                        match tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(stream))
                            .await
                        {
                            Ok(Ok(tls_stream)) => {
                                handle_connection(tls_stream, permit, handle, limits).await
                            }
                            Ok(Err(e)) => Err(AppError::Io(e)),
                            Err(_) => Err(AppError::HandshakeTimeout),
                        }
                    }
                    None => handle_connection(stream, permit, handle, limits).await,
                };

                match result {
                    Ok(()) => {}
                    Err(e @ (AppError::Io(_) | AppError::HandshakeTimeout)) => {
                        warn!("Connection abandoned: {}", e);
                    }
                    Err(e) => error!("Connection handler error: {}", e),
                }
            }
            .instrument(span),
        );
    }
}
