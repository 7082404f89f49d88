//! Unit type catalog.
//!
//! An init-time registration table mapping a type name to its constructor
//! and restore functions. Lookup by unknown name is a normal outcome, not
//! an error — callers distinguish it from construction failures.

use crate::unit::BoxedUnit;
use crate::workloads::{GrepUnit, SortUnit, TailUnit};
use crate::UnitResult;
use std::collections::HashMap;
use tracing::debug;

/// Construct a fresh unit from an argument list.
pub type CreateFn = fn(Vec<String>) -> UnitResult<BoxedUnit>;

/// Reconstruct a unit from its argument list plus an encoded state record
/// produced by [`MigratableUnit::snapshot`](crate::MigratableUnit::snapshot).
/// Restored streams reattach on first I/O.
pub type RestoreFn = fn(Vec<String>, &[u8]) -> UnitResult<BoxedUnit>;

/// A registered unit type.
#[derive(Clone)]
pub struct UnitFactory {
    pub name: &'static str,
    pub create: CreateFn,
    pub restore: RestoreFn,
}

/// Name → factory table of every unit type this host can run.
#[derive(Default)]
pub struct UnitCatalog {
    factories: HashMap<&'static str, UnitFactory>,
}

impl UnitCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog of built-in workloads.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(GrepUnit::factory());
        catalog.register(SortUnit::factory());
        catalog.register(TailUnit::factory());
        catalog
    }

    /// Register a unit type. A later registration under the same name wins.
    pub fn register(&mut self, factory: UnitFactory) {
        debug!(name = factory.name, "registered unit type");
        self.factories.insert(factory.name, factory);
    }

    pub fn get(&self, name: &str) -> Option<&UnitFactory> {
        self.factories.get(name)
    }

    /// Registered type names, sorted for stable listings.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
