//! # Unit Registry and Migration Protocol
//!
//! The per-host half of the migration framework: a registry that tracks
//! live units and assigns identity, the client side that suspends a local
//! unit and ships it out, and the server side that accepts inbound units
//! and resumes them under the local registry.
//!
//! A transfer is one connection: the client writes one serialized unit
//! record, reads one boolean acknowledgement, and closes. On ack success
//! the source copy is retired; on ack failure or any transport error the
//! source copy is resumed — a unit is never left stranded suspended.

pub mod client;
pub mod config;
pub mod registry;
pub mod server;
pub mod wire;

pub use config::ManagerConfig;
pub use registry::{UnitId, UnitRegistry, UnitSummary};
pub use server::MigrationServer;
pub use wire::UnitRecord;

use portage_unit::UnitError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the registry and the migration protocol.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// No live unit under this id.
    #[error("no such unit: {0}")]
    NoSuchUnit(UnitId),

    /// The unit exists but is not parked in the suspended state.
    #[error("unit {0} is not suspended")]
    NotSuspended(UnitId),

    /// The destination does not know this unit type.
    #[error("unknown unit type: '{0}'")]
    UnknownType(String),

    /// A blocking operation did not observe its state change in time.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// The destination answered the transfer with a rejection.
    #[error("destination rejected the unit")]
    Rejected,

    /// Could not reach the destination manager.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Socket-level failure during a transfer or on the listener.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A record larger than the configured limit.
    #[error("record of {size} bytes exceeds the {max} byte limit")]
    Oversized { size: usize, max: usize },

    /// The record payload could not be encoded or decoded.
    #[error("malformed record: {0}")]
    Codec(#[from] bincode::Error),

    /// Configuration file problems.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure raised by the unit itself (construction, snapshot, restore).
    #[error(transparent)]
    Unit(#[from] UnitError),
}

/// Result type for registry and migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;
