//! Cooperative control channel between the registry and a unit's task.
//!
//! The controller is the sole writer of [`Directive`]; the unit's driver
//! task is the sole writer of [`Phase`]. Latest-wins watch channels replace
//! flag polling: `suspend()`/`kill()` callers wait on the phase channel
//! instead of sleeping in a loop.

use std::time::Duration;
use tokio::sync::watch;

/// What the controller currently wants from the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Directive {
    #[default]
    Run,
    Suspend,
    Terminate,
}

/// Where the unit currently is, as reported by its driver task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Running,
    Suspended,
    Finished,
}

/// How a work loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The loop ran out of work.
    Completed,
    /// The loop observed `Directive::Suspend` at a safe point and exited;
    /// the unit value is parked for snapshot or resume.
    Suspended,
    /// The loop observed `Directive::Terminate` at a safe point.
    Terminated,
}

/// Safe-point probe handed to a unit's work loop.
///
/// Work loops call [`UnitControl::interrupted`] between discrete, resumable
/// steps — never mid-record. Any state needed to continue after the probe
/// must already live in unit fields.
#[derive(Debug)]
pub struct UnitControl {
    directive: watch::Receiver<Directive>,
}

impl UnitControl {
    pub fn new(directive: watch::Receiver<Directive>) -> Self {
        Self { directive }
    }

    /// Current directive, without blocking.
    pub fn checkpoint(&self) -> Directive {
        *self.directive.borrow()
    }

    /// Safe-point check: `Some(exit)` when the loop should stop here.
    pub fn interrupted(&self) -> Option<Exit> {
        match self.checkpoint() {
            Directive::Run => None,
            Directive::Suspend => Some(Exit::Suspended),
            Directive::Terminate => Some(Exit::Terminated),
        }
    }

    /// Sleep for `delay`, waking early if the directive changes so the next
    /// safe point is reached promptly.
    pub async fn pace(&mut self, delay: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.directive.changed() => {}
        }
    }
}
