//! The migratable unit trait.

use crate::control::{Exit, UnitControl};
use crate::{UnitError, UnitResult};
use async_trait::async_trait;

/// A unit boxed for the registry's live map and the migration path.
pub type BoxedUnit = Box<dyn MigratableUnit>;

/// A long-running, suspendable, migratable piece of work.
///
/// Implementations own their transactional streams and any resumable step
/// state as plain fields. The contract:
///
/// - `run` loops over discrete steps, calling
///   [`UnitControl::interrupted`](crate::UnitControl::interrupted) between
///   them and returning the corresponding [`Exit`] when asked to stop.
///   Returning `Exit::Suspended` parks the unit value; a later resume calls
///   `run` again on the same value, which must continue from its saved step
///   rather than restart.
/// - `snapshot` produces the unit's entire resumable state (step markers,
///   in-flight record, stream path+offset pairs) as an encoded record. Live
///   handles and task state are excluded by construction; the restoring
///   side rebuilds them lazily.
#[async_trait]
pub trait MigratableUnit: Send + 'static {
    /// Catalog name of this unit type.
    fn type_name(&self) -> &'static str;

    /// The argument list the unit was started with.
    fn arguments(&self) -> &[String];

    /// Encode the resumable state record for transfer.
    fn snapshot(&self) -> UnitResult<Vec<u8>>;

    /// The work loop. Runs until the work is done or a directive stops it
    /// at a safe point.
    async fn run(&mut self, ctl: &mut UnitControl) -> Result<Exit, UnitError>;
}
