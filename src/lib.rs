pub mod core;
pub mod factory;

// Re-export commonly used types
pub use crate::core::buffer::{BoundedBuffer, Reservation};
pub use crate::core::config::FactoryConfig;
pub use crate::core::errors::{FactoryError, Result};
pub use crate::core::shutdown::ShutdownSignal;
pub use crate::core::types::{Component, ComponentKind, IdAllocator, Shovel};
pub use crate::core::worker_pool::{PoolState, WorkerPool};
pub use crate::factory::simulation::{FactorySimulation, StockLevels};
