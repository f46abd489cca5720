use crate::core::buffer::BoundedBuffer;
use crate::core::errors::{FactoryError, Result};
use crate::core::shutdown::ShutdownSignal;
use crate::core::stats::ProductionStats;
use crate::core::types::{Component, ComponentKind, IdAllocator};
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;

/// What one supply cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplyOutcome {
    /// A component with this id went into the buffer
    Supplied(u64),
    /// The buffer looked full, nothing was made
    Skipped,
}

/// Periodically makes components of one kind and puts them into its buffer
pub struct Supplier {
    id: usize,
    kind: ComponentKind,
    bin: Arc<BoundedBuffer<Component>>,
    ids: Arc<IdAllocator>,
    interval: Duration,
    signal: ShutdownSignal,
    stats: Arc<ProductionStats>,
}

impl Supplier {
    pub fn new(
        id: usize,
        kind: ComponentKind,
        bin: Arc<BoundedBuffer<Component>>,
        ids: Arc<IdAllocator>,
        interval: Duration,
        signal: ShutdownSignal,
        stats: Arc<ProductionStats>,
    ) -> Self {
        Self {
            id,
            kind,
            bin,
            ids,
            interval,
            signal,
            stats,
        }
    }

    /// Supply until shutdown
    pub fn run(self) {
        info!("[{} Supplier {}] Started", self.kind, self.id);
        while !self.signal.is_triggered() {
            match self.supply_once() {
                Ok(_) => {}
                Err(FactoryError::Cancelled) => break,
                Err(e) => {
                    error!("[{} Supplier {}] Stopping: {}", self.kind, self.id, e);
                    break;
                }
            }
        }
        info!("[{} Supplier {}] Stopped", self.kind, self.id);
    }

    /// Wait one interval, then supply one component unless the buffer is full.
    ///
    /// The fullness check is advisory: if the buffer fills between the check
    /// and the put, the put blocks until space frees up.
    pub fn supply_once(&self) -> Result<SupplyOutcome> {
        if !self.signal.sleep(self.interval) {
            return Err(FactoryError::Cancelled);
        }

        if self.bin.is_full() {
            self.stats.record_supply_skipped();
            debug!(
                "[{} Supplier {}] Buffer {} full, skipping cycle",
                self.kind,
                self.id,
                self.bin.name()
            );
            return Ok(SupplyOutcome::Skipped);
        }

        let component = self.ids.make_component(self.kind);
        let component_id = component.id();
        self.bin.put(component)?;
        self.stats.record_supplied(self.kind);
        debug!("[{} Supplier {}] Supplied {} {}", self.kind, self.id, self.kind, component_id);

        Ok(SupplyOutcome::Supplied(component_id))
    }
}
