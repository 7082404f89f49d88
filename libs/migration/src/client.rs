//! Outbound transfer: one connection, one record, one acknowledgement.

use crate::config::ManagerConfig;
use crate::wire::{self, UnitRecord};
use crate::{MigrationError, Result};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Ship a serialized unit to a destination manager and return its verdict.
///
/// `Ok(true)` means the destination accepted and started the unit;
/// `Ok(false)` means it answered with a rejection. Every transport failure
/// surfaces as an error so the caller can roll the local copy back.
pub async fn send_unit(addr: &str, record: &UnitRecord, config: &ManagerConfig) -> Result<bool> {
    debug!(addr, type_name = %record.type_name, "sending unit");

    let connect_timeout = config.connect_timeout();
    let mut stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| MigrationError::Timeout {
            operation: "connect",
            timeout: connect_timeout,
        })?
        .map_err(|e| MigrationError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;
    if let Err(e) = stream.set_nodelay(true) {
        warn!(addr, error = %e, "failed to set TCP_NODELAY");
    }

    wire::write_record(&mut stream, record, config.max_record_size).await?;

    let ack_timeout = config.ack_timeout();
    let accepted = tokio::time::timeout(ack_timeout, wire::read_ack(&mut stream))
        .await
        .map_err(|_| MigrationError::Timeout {
            operation: "acknowledgement",
            timeout: ack_timeout,
        })??;

    debug!(addr, accepted, "transfer acknowledged");
    Ok(accepted)
}
