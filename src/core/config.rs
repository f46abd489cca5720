//! Configuration for a factory run.
//!
//! Holds buffer capacities, actor counts and timing constants. Values can
//! come from `Default`, the `with_*` builders, or a TOML file; every path
//! ends in [`FactoryConfig::validate`].

use super::errors::{FactoryError, Result};
use super::types::ComponentKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    // Buffer capacities
    pub handle_capacity: usize,
    pub blade_capacity: usize,
    pub shovel_capacity: usize,

    // Actor counts
    pub handle_suppliers: usize,
    pub blade_suppliers: usize,
    pub assemblers: usize,
    pub dealers: usize,

    // Timing (milliseconds)
    pub handle_supply_interval_ms: u64,
    pub blade_supply_interval_ms: u64,
    pub assembly_delay_ms: u64,

    /// Stock level dealers restock the shovel buffer up to
    pub restock_target: usize,

    /// Worker threads. `None` means one thread per actor.
    pub worker_threads: Option<usize>,

    pub run_duration_secs: u64,
    pub shutdown_timeout_ms: u64,
    pub event_log_path: PathBuf,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            handle_capacity: 100,
            blade_capacity: 100,
            shovel_capacity: 100,

            handle_suppliers: 4,
            blade_suppliers: 4,
            assemblers: 5,
            dealers: 10,

            handle_supply_interval_ms: 100,
            blade_supply_interval_ms: 150,
            assembly_delay_ms: 250,

            restock_target: 50,
            worker_threads: None,

            run_duration_secs: 60,
            shutdown_timeout_ms: 5000,
            event_log_path: PathBuf::from("shovel_log.txt"),
        }
    }
}

impl FactoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| FactoryError::InvalidConfig(format!("malformed TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| FactoryError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn with_buffer_capacities(mut self, capacity: usize) -> Self {
        self.handle_capacity = capacity;
        self.blade_capacity = capacity;
        self.shovel_capacity = capacity;
        self
    }

    pub fn with_suppliers(mut self, handle_suppliers: usize, blade_suppliers: usize) -> Self {
        self.handle_suppliers = handle_suppliers;
        self.blade_suppliers = blade_suppliers;
        self
    }

    pub fn with_assemblers(mut self, count: usize) -> Self {
        self.assemblers = count;
        self
    }

    pub fn with_dealers(mut self, count: usize) -> Self {
        self.dealers = count;
        self
    }

    pub fn with_supply_intervals(mut self, handle_ms: u64, blade_ms: u64) -> Self {
        self.handle_supply_interval_ms = handle_ms;
        self.blade_supply_interval_ms = blade_ms;
        self
    }

    pub fn with_assembly_delay(mut self, ms: u64) -> Self {
        self.assembly_delay_ms = ms;
        self
    }

    pub fn with_restock_target(mut self, target: usize) -> Self {
        self.restock_target = target;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    pub fn with_run_duration(mut self, secs: u64) -> Self {
        self.run_duration_secs = secs;
        self
    }

    pub fn with_shutdown_timeout(mut self, ms: u64) -> Self {
        self.shutdown_timeout_ms = ms;
        self
    }

    pub fn with_event_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.event_log_path = path.into();
        self
    }

    pub fn capacity_for(&self, kind: ComponentKind) -> usize {
        match kind {
            ComponentKind::Handle => self.handle_capacity,
            ComponentKind::Blade => self.blade_capacity,
        }
    }

    pub fn suppliers_for(&self, kind: ComponentKind) -> usize {
        match kind {
            ComponentKind::Handle => self.handle_suppliers,
            ComponentKind::Blade => self.blade_suppliers,
        }
    }

    pub fn supply_interval(&self, kind: ComponentKind) -> Duration {
        Duration::from_millis(match kind {
            ComponentKind::Handle => self.handle_supply_interval_ms,
            ComponentKind::Blade => self.blade_supply_interval_ms,
        })
    }

    pub fn assembly_delay(&self) -> Duration {
        Duration::from_millis(self.assembly_delay_ms)
    }

    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.run_duration_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Number of long-running loops a run submits
    pub fn actor_count(&self) -> usize {
        self.handle_suppliers + self.blade_suppliers + self.assemblers + self.dealers
    }

    /// Effective worker pool size
    pub fn pool_size(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| self.actor_count())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(FactoryError::InvalidConfig(msg.to_string()));

        if self.handle_capacity == 0 || self.blade_capacity == 0 || self.shovel_capacity == 0 {
            return invalid("buffer capacities must be greater than 0");
        }

        if self.handle_suppliers == 0
            || self.blade_suppliers == 0
            || self.assemblers == 0
            || self.dealers == 0
        {
            return invalid("supplier, assembler and dealer counts must be greater than 0");
        }

        if self.handle_supply_interval_ms == 0
            || self.blade_supply_interval_ms == 0
            || self.assembly_delay_ms == 0
        {
            return invalid("supply intervals and assembly delay must be greater than 0");
        }

        if self.restock_target == 0 {
            return invalid("restock target must be greater than 0");
        }

        if self.restock_target > self.shovel_capacity {
            return Err(FactoryError::InvalidConfig(format!(
                "restock target {} exceeds shovel capacity {}",
                self.restock_target, self.shovel_capacity
            )));
        }

        // Actor loops hold their worker for life; fewer threads would starve some
        if self.pool_size() < self.actor_count() {
            return Err(FactoryError::InvalidConfig(format!(
                "worker pool of {} thread(s) cannot host {} long-running actors",
                self.pool_size(),
                self.actor_count()
            )));
        }

        if self.shutdown_timeout_ms == 0 {
            return invalid("shutdown timeout must be greater than 0");
        }

        Ok(())
    }
}
