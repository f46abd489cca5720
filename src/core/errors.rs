use super::types::ComponentKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the factory machinery
#[derive(Debug, Error)]
pub enum FactoryError {
    /// A capacity, count or timing value failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// Task submitted after the worker pool began shutting down
    #[error("worker pool is closed")]
    PoolClosed,

    /// A blocking wait was interrupted by shutdown
    #[error("operation cancelled by shutdown")]
    Cancelled,

    /// A buffer handed over a component of the wrong kind
    #[error("expected a {expected} but received a {found}")]
    ComponentMismatch {
        expected: ComponentKind,
        found: ComponentKind,
    },

    #[error("failed to write event log: {0}")]
    LogWriteFailure(#[from] std::io::Error),

    #[error("shutdown timed out with {pending} worker(s) still running")]
    ShutdownTimeout { pending: usize },
}

pub type Result<T> = std::result::Result<T, FactoryError>;
