//! Connection pooling
//!
//! The pool keeps one state block behind a single lock. It is made of a
//! capacity ledger (connections open vs. the ceiling), an idle store (bounded
//! FIFO of returned connections) and a waiter queue (callers parked while
//! the pool is saturated).
//!
//! # Example
//!
//! ```ignore
//! use connpool::{FnFactory, Pool, PoolConfig};
//!
//! let factory = FnFactory::builder()
//!     .create(|| async { Ok(Channel::dial("127.0.0.1:16777").await?) })
//!     .close(|conn: Channel| async move { conn.shutdown().await })
//!     .build()?;
//!
//! let config = PoolConfig::new(5, 10, 100).with_idle_timeout_ms(20_000);
//! let pool = Pool::new(config, factory).await?;
//!
//! let conn = pool.get().await?;
//! // Use connection...
//! pool.put(conn).await?;
//! ```

mod config;
mod guard;
mod idle;
mod ledger;
mod pool;
mod stats;
mod waiters;


pub use config::PoolConfig;
pub use guard::PooledConnection;
pub use pool::Pool;
pub use stats::PoolStats;
