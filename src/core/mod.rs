pub mod buffer;
pub mod config;
pub mod errors;
pub mod event_log;
pub mod shutdown;
pub mod stats;
pub mod types;
pub mod worker_pool;
