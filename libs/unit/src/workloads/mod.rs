//! Built-in workloads.
//!
//! Example payloads for the migration framework. Each one keeps every piece
//! of resumable state — step markers, the record in flight, stream
//! offsets — in plain fields covered by its snapshot, so a migrated copy
//! continues at the same step instead of restarting the record.

mod grep;
mod sort;
mod tail;

pub use grep::GrepUnit;
pub use sort::SortUnit;
pub use tail::TailUnit;

use std::time::Duration;

/// Pacing between work-loop steps. Keeps a unit's progress observable from
/// outside so mid-run suspension has a window to land in.
pub(crate) const STEP_DELAY: Duration = Duration::from_millis(20);
