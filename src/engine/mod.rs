//! Event processing engine: the worker pool and its shutdown coordination.

pub mod pool;
pub mod shutdown;

pub use pool::{PoolConfig, PoolState, WorkerPool};
pub use shutdown::ShutdownCoordinator;
