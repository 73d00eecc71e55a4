//! TCP server: owns the listener and the shared store, and spawns one
//! [`ConnectionHandler`](crate::connection::ConnectionHandler) task per
//! accepted client.

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use crate::protocol::stream::DEFAULT_MAX_FRAME_BYTES;
use crate::storage::KeyValueStore;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{error, info};

/// Per-connection limits applied by the server.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Largest single message a client may send before being disconnected
    pub max_frame_bytes: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    store: Arc<KeyValueStore>,
    stats: Arc<ConnectionStats>,
    options: ServerOptions,
}

impl Server {
    /// Binds the listener and creates an empty store.
    pub async fn bind(addr: impl ToSocketAddrs, options: ServerOptions) -> std::io::Result<Self> {
        Self::bind_with_store(addr, options, Arc::new(KeyValueStore::new())).await
    }

    /// Binds the listener around an existing store.
    pub async fn bind_with_store(
        addr: impl ToSocketAddrs,
        options: ServerOptions,
        store: Arc<KeyValueStore>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            store,
            stats: Arc::new(ConnectionStats::new()),
            options,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn store(&self) -> &Arc<KeyValueStore> {
        &self.store
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }

    /// Accepts connections forever.
    pub async fn run(self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Accepts connections until `shutdown` completes.
    ///
    /// Connections already being served keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        match self.listener.local_addr() {
            Ok(addr) => info!(%addr, "Listening"),
            Err(e) => error!(error = %e, "Listening on unknown address"),
        }

        tokio::select! {
            _ = self.accept_loop() => {}
            _ = shutdown => {
                info!("Shutdown signal received, no longer accepting connections");
            }
        }
    }

    async fn accept_loop(&self) {
        let mut failures = 0u32;
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    failures = 0;
                    let handler = CommandHandler::new(Arc::clone(&self.store));
                    let stats = Arc::clone(&self.stats);
                    let max_frame_bytes = self.options.max_frame_bytes;

                    tokio::spawn(async move {
                        handle_connection(stream, addr, handler, stats, max_frame_bytes).await;
                    });
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = accept_backoff(failures);
                    error!(
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Failed to accept connection"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

const MAX_ACCEPT_BACKOFF_MS: u64 = 1000;

/// Delay before retrying after `failures` consecutive accept errors, such as
/// running out of file descriptors. Doubles from 10ms up to one second.
fn accept_backoff(failures: u32) -> Duration {
    let ms = 10u64.saturating_mul(1 << failures.saturating_sub(1).min(7));
    Duration::from_millis(ms.min(MAX_ACCEPT_BACKOFF_MS))
}
