//! The factory actors and the run that hosts them.
//!
//! Suppliers feed the handle and blade buffers, assemblers turn parts into
//! shovels, dealers sell shovels and restock. Every actor is a long-lived
//! loop submitted to the worker pool.

pub mod assembler;
pub mod dealer;
pub mod simulation;
pub mod supplier;
pub mod workshop;

pub use assembler::Assembler;
pub use dealer::{Dealer, Sale};
pub use simulation::{FactorySimulation, StockLevels};
pub use supplier::{Supplier, SupplyOutcome};
pub use workshop::Workshop;
