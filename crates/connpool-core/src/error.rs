//! Error types

use std::time::Duration;

use thiserror::Error;

/// Errors produced by pool operations
#[derive(Error, Debug)]
pub enum PoolError {
    /// Capacity ordering violated or a required callback is missing
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Pre-warming failed; every connection created so far was closed
    #[error("Factory is not able to fill the pool: {0}")]
    FactoryInitFailed(anyhow::Error),

    #[error("Pool is closed")]
    PoolClosed,

    /// A waiting borrow was released by teardown instead of a connection
    #[error("Max active connections reached")]
    MaxActiveReached,

    /// The factory failed during on-demand creation
    #[error("Failed to create connection: {0}")]
    CreateFailed(anyhow::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The close callback reported an error
    #[error("Failed to close connection: {0}")]
    CloseFailed(anyhow::Error),

    #[error("Timed out waiting for connection (timeout: {0:?})")]
    Timeout(Duration),
}

impl PoolError {
    /// Whether the error means the pool will never serve this caller again
    pub fn is_closed(&self) -> bool {
        matches!(self, PoolError::PoolClosed | PoolError::MaxActiveReached)
    }
}

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;
