use super::types::ComponentKind;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Production counters shared by every actor in a run
#[derive(Debug, Default)]
pub struct ProductionStats {
    handles_supplied: AtomicU64,
    blades_supplied: AtomicU64,
    /// Supply cycles skipped because the target buffer looked full
    supply_skipped: AtomicU64,
    assembled: AtomicU64,
    restocked: AtomicU64,
    sold: AtomicU64,
}

impl ProductionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_supplied(&self, kind: ComponentKind) {
        match kind {
            ComponentKind::Handle => self.handles_supplied.fetch_add(1, Ordering::Relaxed),
            ComponentKind::Blade => self.blades_supplied.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_supply_skipped(&self) {
        self.supply_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_assembled(&self) {
        self.assembled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restocked(&self) {
        self.restocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sold(&self) {
        self.sold.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            handles_supplied: self.handles_supplied.load(Ordering::Relaxed),
            blades_supplied: self.blades_supplied.load(Ordering::Relaxed),
            supply_skipped: self.supply_skipped.load(Ordering::Relaxed),
            assembled: self.assembled.load(Ordering::Relaxed),
            restocked: self.restocked.load(Ordering::Relaxed),
            sold: self.sold.load(Ordering::Relaxed),
            dropped_log_lines: 0,
        }
    }
}

/// Point-in-time copy of [`ProductionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub handles_supplied: u64,
    pub blades_supplied: u64,
    pub supply_skipped: u64,
    pub assembled: u64,
    pub restocked: u64,
    pub sold: u64,
    pub dropped_log_lines: u64,
}

impl StatsSnapshot {
    /// Shovels built by either path
    pub fn shovels_built(&self) -> u64 {
        self.assembled + self.restocked
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "supplied {} handle(s) and {} blade(s) ({} cycle(s) skipped), \
             assembled {}, restocked {}, sold {}",
            self.handles_supplied,
            self.blades_supplied,
            self.supply_skipped,
            self.assembled,
            self.restocked,
            self.sold
        )?;
        if self.dropped_log_lines > 0 {
            write!(f, ", {} log line(s) dropped", self.dropped_log_lines)?;
        }
        Ok(())
    }
}
