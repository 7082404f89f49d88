//! Inbound migration listener.

use crate::registry::UnitRegistry;
use crate::wire;
use crate::{MigrationError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Accepts inbound unit transfers and hands them to the local registry.
///
/// Each accepted connection is handled in its own task: one record in, one
/// acknowledgement out, connection closed. A stop request shuts the accept
/// loop down cleanly; any other accept failure is fatal to the listener.
pub struct MigrationServer {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_loop: JoinHandle<()>,
}

impl MigrationServer {
    /// Bind the listener and start accepting. Bind failure is fatal to the
    /// caller.
    pub async fn start(registry: Arc<UnitRegistry>, bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(MigrationError::Transport)?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "migration server listening");

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let accept_loop = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!(%local_addr, "migration server stopped");
                        break;
                    }
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "inbound migration connection");
                            let registry = Arc::clone(&registry);
                            tokio::spawn(handle_transfer(stream, peer, registry));
                        }
                        Err(e) => {
                            error!(%local_addr, error = %e, "accept failed, shutting listener down");
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            local_addr,
            shutdown,
            accept_loop,
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Request a clean shutdown and wait for the accept loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.accept_loop.await;
    }
}

/// One unit transfer: read the record, restore and start the unit, answer.
async fn handle_transfer(mut stream: TcpStream, peer: SocketAddr, registry: Arc<UnitRegistry>) {
    let max_size = registry.config().max_record_size;
    let outcome = match wire::read_record(&mut stream, max_size).await {
        Ok(record) => registry.adopt(record),
        Err(e) => Err(e),
    };

    let accepted = match &outcome {
        Ok(id) => {
            info!(%peer, id, "accepted migrated unit");
            true
        }
        Err(e) => {
            warn!(%peer, error = %e, "rejected inbound transfer");
            false
        }
    };

    if let Err(e) = wire::write_ack(&mut stream, accepted).await {
        error!(%peer, error = %e, "failed to send transfer acknowledgement");
    }
}
