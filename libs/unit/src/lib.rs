//! # Migratable Units
//!
//! The abstract work item of the migration framework. A unit is a
//! long-running, stateful piece of work that checks a cooperative control
//! channel at safe points in its loop, can exit early as `Suspended`, and
//! can reconstruct itself from a plain-data snapshot on another host.
//!
//! The crate carries three pieces:
//! - the [`MigratableUnit`] trait and the [`UnitControl`] safe-point probe,
//! - the [`UnitCatalog`] registration table mapping type names to factories,
//! - the built-in workloads (`grep`, `sort`, `tail`).

pub mod catalog;
pub mod control;
pub mod unit;
pub mod workloads;

pub use catalog::{UnitCatalog, UnitFactory};
pub use control::{Directive, Exit, Phase, UnitControl};
pub use unit::{BoxedUnit, MigratableUnit};
pub use workloads::{GrepUnit, SortUnit, TailUnit};

use thiserror::Error;

/// Errors a unit can raise while being constructed, run, or snapshotted.
#[derive(Debug, Error)]
pub enum UnitError {
    /// Malformed argument list; reported to the caller, no state changes.
    #[error("usage: {0}")]
    Usage(String),

    /// I/O failure on one of the unit's own streams.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot state could not be encoded or decoded.
    #[error("state encoding error: {0}")]
    State(#[from] bincode::Error),
}

/// Result type for unit operations.
pub type UnitResult<T> = std::result::Result<T, UnitError>;
