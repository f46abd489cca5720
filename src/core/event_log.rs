//! Append-only production event log.
//!
//! Every assembled, restocked and sold shovel becomes one line such as
//! `Dealer 3: Shovel 42 (Handle: 7, Blade: 9) sold`. Sinks serialize their
//! own writes; [`EventLog`] wraps a sink so that a failed write is retried
//! once and then dropped without ever stopping production.

use super::errors::{FactoryError, Result};
use super::types::Shovel;
use log::{debug, warn};
use parking_lot::Mutex;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorKind {
    Assembler,
    Dealer,
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorKind::Assembler => f.write_str("Assembler"),
            ActorKind::Dealer => f.write_str("Dealer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductionAction {
    /// Built by an assembler's regular loop
    Assembled,
    /// Built by a dealer restocking the shovel buffer
    Produced,
    /// Removed from the shovel buffer by a dealer
    Sold,
}

impl fmt::Display for ProductionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductionAction::Assembled => f.write_str("assembled"),
            ProductionAction::Produced => f.write_str("produced"),
            ProductionAction::Sold => f.write_str("sold"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionEvent {
    pub actor: ActorKind,
    pub actor_id: usize,
    pub shovel_id: u64,
    pub handle_id: u64,
    pub blade_id: u64,
    pub action: ProductionAction,
}

impl ProductionEvent {
    pub fn new(actor: ActorKind, actor_id: usize, shovel: &Shovel, action: ProductionAction) -> Self {
        Self {
            actor,
            actor_id,
            shovel_id: shovel.id(),
            handle_id: shovel.handle().id(),
            blade_id: shovel.blade().id(),
            action,
        }
    }
}

impl fmt::Display for ProductionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: Shovel {} (Handle: {}, Blade: {}) {}",
            self.actor, self.actor_id, self.shovel_id, self.handle_id, self.blade_id, self.action
        )
    }
}

/// Write-only destination for event lines. Implementations must be safe
/// to call from many threads at once.
pub trait EventSink: Send + Sync {
    fn append(&self, line: &str) -> Result<()>;
}

/// Appends lines to a file, one lock around the writer
pub struct FileEventLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileEventLog {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for FileEventLog {
    fn append(&self, line: &str) -> Result<()> {
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        writer.flush().map_err(FactoryError::from)
    }
}

/// Keeps lines in memory
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Number of lines ending with the given action
    pub fn count_action(&self, action: ProductionAction) -> usize {
        let suffix = format!(" {}", action);
        self.lines
            .lock()
            .iter()
            .filter(|line| line.ends_with(&suffix))
            .count()
    }
}

impl EventSink for MemoryEventLog {
    fn append(&self, line: &str) -> Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}

/// Shared handle actors record through. Write failures are absorbed here.
#[derive(Clone)]
pub struct EventLog {
    sink: Arc<dyn EventSink>,
    dropped: Arc<AtomicU64>,
}

impl EventLog {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append one event, retrying once before dropping the line
    pub fn record(&self, event: &ProductionEvent) {
        let line = event.to_string();
        debug!("{}", line);

        if let Err(first) = self.sink.append(&line) {
            warn!("Event log write failed ({}), retrying once", first);
            if let Err(second) = self.sink.append(&line) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping event log line '{}': {}", line, second);
            }
        }
    }

    /// Lines lost to sink failures so far
    pub fn dropped_lines(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("dropped", &self.dropped_lines())
            .finish()
    }
}
