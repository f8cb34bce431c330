//! Connpool - A bounded pool of reusable connections
//!
//! Callers borrow a connection with [`Pool::get`], use it, and hand it back
//! with [`Pool::put`]. The pool caps the number of open connections, keeps a
//! bounded FIFO of idle ones, queues callers when it is saturated and lazily
//! evicts idle connections that timed out or fail their health check.

pub mod health;
pub mod pool;

pub use connpool_core::{ConnectionFactory, FnFactory, FnFactoryBuilder, PoolError, Result};
pub use health::{PingError, PingResult, ping_connection};
pub use pool::{Pool, PoolConfig, PoolStats, PooledConnection};
