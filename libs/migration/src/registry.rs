//! Unit registry.
//!
//! Per-host bookkeeping: assigns monotonically increasing identities,
//! tracks live units, drives their tasks, and mediates the outbound
//! migration protocol. Constructed explicitly and shared via `Arc` — one
//! instance per host, no hidden global.

use crate::client;
use crate::config::ManagerConfig;
use crate::wire::UnitRecord;
use crate::{MigrationError, Result};
use dashmap::DashMap;
use portage_unit::{BoxedUnit, Directive, Exit, Phase, UnitCatalog, UnitControl};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

/// Unit identity, unique within one registry's lifetime.
pub type UnitId = u64;

/// Listing row for the control surface.
#[derive(Debug, Clone)]
pub struct UnitSummary {
    pub id: UnitId,
    pub type_name: String,
    pub arguments: Vec<String>,
}

impl fmt::Display for UnitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.type_name, self.id, self.arguments.join(", "))
    }
}

/// One live unit's control block.
///
/// The registry writes directives; the unit's driver task writes the phase.
/// While suspended, the unit value itself sits in `parked` awaiting
/// snapshot, resume, or retirement.
struct UnitEntry {
    id: UnitId,
    type_name: String,
    arguments: Vec<String>,
    directive: watch::Sender<Directive>,
    phase_tx: watch::Sender<Phase>,
    phase_rx: watch::Receiver<Phase>,
    parked: Mutex<Option<BoxedUnit>>,
}

/// Tracks live units and mediates migration for one host.
pub struct UnitRegistry {
    catalog: UnitCatalog,
    config: ManagerConfig,
    next_id: AtomicU64,
    units: DashMap<UnitId, Arc<UnitEntry>>,
}

impl UnitRegistry {
    pub fn new(catalog: UnitCatalog, config: ManagerConfig) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            config,
            next_id: AtomicU64::new(0),
            units: DashMap::new(),
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &UnitCatalog {
        &self.catalog
    }

    /// Next identity. Monotonic, never reused, including across migrations.
    pub fn generate_id(&self) -> UnitId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Start a unit by catalog name. `Ok(None)` means the name is unknown —
    /// a normal outcome, distinct from construction failures.
    pub fn start_local(
        self: &Arc<Self>,
        type_name: &str,
        arguments: Vec<String>,
    ) -> Result<Option<UnitId>> {
        let Some(factory) = self.catalog.get(type_name) else {
            return Ok(None);
        };
        let unit = (factory.create)(arguments)?;
        Ok(Some(self.start_unit(unit)))
    }

    /// Register a unit and spawn its driver task. Used for local starts and
    /// for migration arrivals alike; the id assigned here is the unit's
    /// identity on this host.
    pub fn start_unit(self: &Arc<Self>, unit: BoxedUnit) -> UnitId {
        let id = self.generate_id();
        let (directive_tx, directive_rx) = watch::channel(Directive::Run);
        let (phase_tx, phase_rx) = watch::channel(Phase::Running);
        let entry = Arc::new(UnitEntry {
            id,
            type_name: unit.type_name().to_string(),
            arguments: unit.arguments().to_vec(),
            directive: directive_tx,
            phase_tx,
            phase_rx,
            parked: Mutex::new(None),
        });
        self.units.insert(id, Arc::clone(&entry));
        info!(id, type_name = %entry.type_name, "unit started");
        self.spawn_driver(unit, entry, directive_rx);
        id
    }

    /// Reconstruct an inbound unit and start it under a fresh local id.
    /// Restored streams reattach on their first I/O.
    pub fn adopt(self: &Arc<Self>, record: UnitRecord) -> Result<UnitId> {
        let Some(factory) = self.catalog.get(&record.type_name) else {
            return Err(MigrationError::UnknownType(record.type_name));
        };
        let unit = (factory.restore)(record.arguments, &record.state)?;
        let id = self.start_unit(unit);
        info!(id, type_name = %record.type_name, "unit arrived");
        Ok(id)
    }

    fn spawn_driver(
        self: &Arc<Self>,
        mut unit: BoxedUnit,
        entry: Arc<UnitEntry>,
        directive_rx: watch::Receiver<Directive>,
    ) {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ctl = UnitControl::new(directive_rx);
            match unit.run(&mut ctl).await {
                Ok(Exit::Suspended) => {
                    debug!(id = entry.id, "unit reached a safe point and suspended");
                    *entry.parked.lock().await = Some(unit);
                    entry.phase_tx.send_replace(Phase::Suspended);
                }
                Ok(Exit::Completed) => {
                    info!(id = entry.id, type_name = %entry.type_name, "unit completed");
                    registry.finish(&entry);
                }
                Ok(Exit::Terminated) => {
                    info!(id = entry.id, type_name = %entry.type_name, "unit terminated");
                    registry.finish(&entry);
                }
                Err(e) => {
                    error!(id = entry.id, type_name = %entry.type_name, error = %e, "unit failed");
                    registry.finish(&entry);
                }
            }
        });
    }

    /// Remove a unit from the live set. Reached exactly once per unit, on
    /// every exit path.
    fn finish(&self, entry: &Arc<UnitEntry>) {
        self.units.remove(&entry.id);
        entry.phase_tx.send_replace(Phase::Finished);
    }

    /// Ask a running unit to suspend and wait for the acknowledgement.
    pub async fn suspend(&self, id: UnitId) -> Result<()> {
        let entry = self.entry(id)?;
        entry.directive.send_replace(Directive::Suspend);
        match self.await_settled(&entry, "suspend").await? {
            Phase::Suspended => Ok(()),
            // The work loop ran out of work before reaching the safe point.
            _ => Err(MigrationError::NoSuchUnit(id)),
        }
    }

    /// Restart a suspended unit on a fresh driver task, continuing from its
    /// saved step state.
    pub async fn resume(self: &Arc<Self>, id: UnitId) -> Result<()> {
        let entry = self.entry(id)?;
        self.resume_entry(&entry).await
    }

    async fn resume_entry(self: &Arc<Self>, entry: &Arc<UnitEntry>) -> Result<()> {
        let Some(unit) = entry.parked.lock().await.take() else {
            return Err(MigrationError::NotSuspended(entry.id));
        };
        entry.directive.send_replace(Directive::Run);
        entry.phase_tx.send_replace(Phase::Running);
        debug!(id = entry.id, "unit resumed");
        self.spawn_driver(unit, Arc::clone(entry), entry.directive.subscribe());
        Ok(())
    }

    /// Terminate a unit and wait until it is gone from the live set.
    pub async fn kill(&self, id: UnitId) -> Result<()> {
        let entry = self.entry(id)?;
        entry.directive.send_replace(Directive::Terminate);
        loop {
            // A parked unit has no driver task; retire it directly.
            if entry.parked.lock().await.take().is_some() {
                self.finish(&entry);
                return Ok(());
            }
            match self.await_settled(&entry, "kill").await? {
                Phase::Finished => return Ok(()),
                // Suspension won the race; the next pass takes the parked unit.
                _ => continue,
            }
        }
    }

    /// Migrate a unit to a destination manager.
    ///
    /// Suspend, serialize, transfer, then finalize: on acknowledgement the
    /// local copy is retired; on rejection or any transport failure the
    /// local copy is resumed. The unit is never left suspended.
    pub async fn migrate(self: &Arc<Self>, id: UnitId, destination: &str) -> Result<()> {
        let entry = self.entry(id)?;
        if let Err(e) = self.suspend(id).await {
            // Withdraw the request so a late safe-point acknowledgement
            // resumes instead of parking forever.
            entry.directive.send_replace(Directive::Run);
            return Err(e);
        }
        let Some(unit) = entry.parked.lock().await.take() else {
            return Err(MigrationError::NoSuchUnit(id));
        };

        match self.transfer(&entry, &unit, destination).await {
            Ok(()) => {
                info!(id, destination, "migration succeeded, retiring local copy");
                drop(unit);
                self.finish(&entry);
                Ok(())
            }
            Err(e) => {
                warn!(id, destination, error = %e, "migration failed, resuming local copy");
                *entry.parked.lock().await = Some(unit);
                self.resume_entry(&entry).await?;
                Err(e)
            }
        }
    }

    async fn transfer(&self, entry: &UnitEntry, unit: &BoxedUnit, destination: &str) -> Result<()> {
        let record = UnitRecord {
            type_name: entry.type_name.clone(),
            arguments: entry.arguments.clone(),
            state: unit.snapshot()?,
        };
        let addr = self.config.migration_addr(destination);
        let accepted = client::send_unit(&addr, &record, &self.config).await?;
        if accepted {
            Ok(())
        } else {
            Err(MigrationError::Rejected)
        }
    }

    /// Wait until the phase channel leaves `Running`, bounded by the
    /// configured control timeout.
    async fn await_settled(&self, entry: &Arc<UnitEntry>, operation: &'static str) -> Result<Phase> {
        let timeout = self.config.control_timeout();
        let mut phase_rx = entry.phase_rx.clone();
        let result = match tokio::time::timeout(timeout, phase_rx.wait_for(|p| *p != Phase::Running)).await {
            Ok(Ok(phase)) => Ok(*phase),
            // The phase sender lives in the entry we hold, so the channel
            // cannot close; treat it as finished if it somehow does.
            Ok(Err(_)) => Ok(Phase::Finished),
            Err(_) => Err(MigrationError::Timeout { operation, timeout }),
        };
        result
    }

    /// Live units, ordered by id.
    pub fn list_units(&self) -> Vec<UnitSummary> {
        let mut units: Vec<_> = self
            .units
            .iter()
            .map(|entry| UnitSummary {
                id: entry.id,
                type_name: entry.type_name.clone(),
                arguments: entry.arguments.clone(),
            })
            .collect();
        units.sort_by_key(|u| u.id);
        units
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Phase watch for one unit; `None` once it has left the live set.
    pub fn subscribe_phase(&self, id: UnitId) -> Option<watch::Receiver<Phase>> {
        self.units.get(&id).map(|entry| entry.phase_rx.clone())
    }

    fn entry(&self, id: UnitId) -> Result<Arc<UnitEntry>> {
        self.units
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(MigrationError::NoSuchUnit(id))
    }
}
