use super::workshop::Workshop;
use crate::core::buffer::BoundedBuffer;
use crate::core::errors::{FactoryError, Result};
use crate::core::event_log::{ActorKind, EventLog, ProductionAction, ProductionEvent};
use crate::core::stats::ProductionStats;
use crate::core::types::Shovel;
use log::{error, info};
use std::sync::Arc;

/// Continuously builds shovels and stocks them in the shovel buffer
pub struct Assembler {
    id: usize,
    workshop: Workshop,
    shovels: Arc<BoundedBuffer<Shovel>>,
    log: EventLog,
    stats: Arc<ProductionStats>,
}

impl Assembler {
    pub fn new(
        id: usize,
        workshop: Workshop,
        shovels: Arc<BoundedBuffer<Shovel>>,
        log: EventLog,
        stats: Arc<ProductionStats>,
    ) -> Self {
        Self {
            id,
            workshop,
            shovels,
            log,
            stats,
        }
    }

    pub fn run(self) {
        info!("[Assembler {}] Started", self.id);
        while !self.workshop.signal().is_triggered() {
            match self.assemble_once() {
                Ok(_) => {}
                Err(FactoryError::Cancelled) => break,
                Err(e) => {
                    error!("[Assembler {}] Stopping: {}", self.id, e);
                    break;
                }
            }
        }
        info!("[Assembler {}] Stopped", self.id);
    }

    /// Build one shovel and put it into the shovel buffer. Returns its id.
    pub fn assemble_once(&self) -> Result<u64> {
        let shovel = self.workshop.build_shovel()?;
        let event = ProductionEvent::new(
            ActorKind::Assembler,
            self.id,
            &shovel,
            ProductionAction::Assembled,
        );

        self.shovels.put(shovel)?;
        self.stats.record_assembled();
        self.log.record(&event);
        Ok(event.shovel_id)
    }
}
