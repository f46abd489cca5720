//! Wires buffers, actors and the worker pool into one factory run.

use super::assembler::Assembler;
use super::dealer::Dealer;
use super::supplier::Supplier;
use super::workshop::Workshop;
use crate::core::buffer::BoundedBuffer;
use crate::core::config::FactoryConfig;
use crate::core::errors::Result;
use crate::core::event_log::{EventLog, EventSink, FileEventLog};
use crate::core::shutdown::ShutdownSignal;
use crate::core::stats::{ProductionStats, StatsSnapshot};
use crate::core::types::{Component, ComponentKind, IdAllocator, Shovel};
use crate::core::worker_pool::{PoolState, WorkerPool};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Snapshot of the three buffers' fill levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevels {
    pub handles: usize,
    pub blades: usize,
    pub shovels: usize,
}

pub struct FactorySimulation {
    config: FactoryConfig,
    handles: Arc<BoundedBuffer<Component>>,
    blades: Arc<BoundedBuffer<Component>>,
    shovels: Arc<BoundedBuffer<Shovel>>,
    ids: Arc<IdAllocator>,
    stats: Arc<ProductionStats>,
    log: EventLog,
    pool: WorkerPool,
    started: bool,
}

impl FactorySimulation {
    /// Validate `config`, create the buffers and start an idle worker pool
    pub fn new(config: FactoryConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        config.validate()?;

        let handles = Arc::new(BoundedBuffer::new("handles", config.handle_capacity)?);
        let blades = Arc::new(BoundedBuffer::new("blades", config.blade_capacity)?);
        let shovels = Arc::new(BoundedBuffer::new("shovels", config.shovel_capacity)?);

        let pool = WorkerPool::new(config.pool_size())?;
        let signal = pool.shutdown_signal();
        signal.attach(handles.clone());
        signal.attach(blades.clone());
        signal.attach(shovels.clone());

        Ok(Self {
            config,
            handles,
            blades,
            shovels,
            ids: Arc::new(IdAllocator::new()),
            stats: Arc::new(ProductionStats::new()),
            log: EventLog::new(sink),
            pool,
            started: false,
        })
    }

    /// Like [`FactorySimulation::new`], logging events to `config.event_log_path`
    pub fn with_file_log(config: FactoryConfig) -> Result<Self> {
        let sink = FileEventLog::open(&config.event_log_path)?;
        info!("Recording production events to {}", sink.path().display());
        Self::new(config, Arc::new(sink))
    }

    /// Submit every supplier, assembler and dealer loop to the pool.
    /// Calling it again is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            warn!("Factory already started");
            return Ok(());
        }
        self.started = true;

        let signal = self.pool.shutdown_signal().clone();
        let workshop = Workshop::new(
            Arc::clone(&self.handles),
            Arc::clone(&self.blades),
            Arc::clone(&self.ids),
            self.config.assembly_delay(),
            signal.clone(),
        );

        for kind in ComponentKind::ALL {
            let bin = match kind {
                ComponentKind::Handle => &self.handles,
                ComponentKind::Blade => &self.blades,
            };
            for id in 0..self.config.suppliers_for(kind) {
                let supplier = Supplier::new(
                    id,
                    kind,
                    Arc::clone(bin),
                    Arc::clone(&self.ids),
                    self.config.supply_interval(kind),
                    signal.clone(),
                    Arc::clone(&self.stats),
                );
                self.pool.submit(move || supplier.run())?;
            }
        }

        for id in 0..self.config.assemblers {
            let assembler = Assembler::new(
                id,
                workshop.clone(),
                Arc::clone(&self.shovels),
                self.log.clone(),
                Arc::clone(&self.stats),
            );
            self.pool.submit(move || assembler.run())?;
        }

        for id in 0..self.config.dealers {
            let dealer = Dealer::new(
                id,
                workshop.clone(),
                Arc::clone(&self.shovels),
                self.config.restock_target,
                self.log.clone(),
                Arc::clone(&self.stats),
            );
            self.pool.submit(move || dealer.run())?;
        }

        info!(
            "Factory started: {} handle supplier(s), {} blade supplier(s), {} assembler(s), {} dealer(s) on {} worker(s)",
            self.config.handle_suppliers,
            self.config.blade_suppliers,
            self.config.assemblers,
            self.config.dealers,
            self.pool.size()
        );
        Ok(())
    }

    /// Start, run for `duration` (or until the shutdown signal fires), then
    /// shut down and return the final statistics.
    pub fn run_for(&mut self, duration: Duration) -> Result<StatsSnapshot> {
        self.start()?;
        self.pool.shutdown_signal().sleep(duration);
        self.shutdown()
    }

    /// Run for the configured duration
    pub fn run(&mut self) -> Result<StatsSnapshot> {
        self.run_for(self.config.run_duration())
    }

    /// Signal every actor to stop and wait up to the configured timeout
    /// for the workers to exit. Idempotent.
    pub fn shutdown(&self) -> Result<StatsSnapshot> {
        self.pool.shutdown_timeout(self.config.shutdown_timeout())?;
        let snapshot = self.stats();
        info!("Factory stopped: {}", snapshot);
        Ok(snapshot)
    }

    pub fn stats(&self) -> StatsSnapshot {
        let mut snapshot = self.stats.snapshot();
        snapshot.dropped_log_lines = self.log.dropped_lines();
        snapshot
    }

    pub fn stock(&self) -> StockLevels {
        StockLevels {
            handles: self.handles.len(),
            blades: self.blades.len(),
            shovels: self.shovels.len(),
        }
    }

    /// Signal that stops this factory when triggered from anywhere
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.pool.shutdown_signal().clone()
    }

    pub fn pool_state(&self) -> PoolState {
        self.pool.state()
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub fn shovels(&self) -> &BoundedBuffer<Shovel> {
        &self.shovels
    }
}
