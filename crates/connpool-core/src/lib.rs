//! Connpool Core - Capability traits and error types for the connection pool
//!
//! This crate provides the seam between the pool and the connections it
//! manages. It defines:
//!
//! - `ConnectionFactory` - Trait for creating, closing and pinging connections
//! - `FnFactory` - A `ConnectionFactory` assembled from closures
//! - `PoolError` - The error taxonomy shared by every pool operation

mod error;
mod factory;

pub use error::*;
pub use factory::*;
