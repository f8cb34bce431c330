//! Pool configuration types

use std::time::Duration;

use connpool_core::{PoolError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a connection pool
///
/// Controls pre-warming, the idle store capacity, the active ceiling and the
/// invalidation policies applied when a connection is borrowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of connections created up front and parked in the idle store
    initial_size: usize,
    /// Maximum number of idle connections kept by the pool
    max_idle: usize,
    /// Maximum number of connections (idle + active) open at once
    max_active: usize,
    /// Milliseconds an idle connection may sit in the store, 0 disables
    #[serde(default)]
    idle_timeout_ms: u64,
    /// Milliseconds a ping may take before the connection counts as unhealthy
    #[serde(default)]
    ping_timeout_ms: Option<u64>,
}

impl PoolConfig {
    /// Create a new pool configuration
    ///
    /// The sizes are not checked here; [`PoolConfig::validate`] runs when the
    /// pool is constructed.
    pub fn new(initial_size: usize, max_idle: usize, max_active: usize) -> Self {
        Self {
            initial_size,
            max_idle,
            max_active,
            idle_timeout_ms: 0,
            ping_timeout_ms: None,
        }
    }

    /// Set the idle timeout in milliseconds
    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    /// Set the ping timeout in milliseconds
    pub fn with_ping_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.ping_timeout_ms = Some(timeout_ms);
        self
    }

    /// Get the number of pre-warmed connections
    pub fn initial_size(&self) -> usize {
        self.initial_size
    }

    /// Get the idle store capacity
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    /// Get the active ceiling
    pub fn max_active(&self) -> usize {
        self.max_active
    }

    /// Get the idle timeout as a Duration, `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }

    /// Get the ping timeout as a Duration if set
    pub fn ping_timeout(&self) -> Option<Duration> {
        self.ping_timeout_ms.map(Duration::from_millis)
    }

    /// Check `initial_size <= max_idle <= max_active` and `max_active > 0`
    pub fn validate(&self) -> Result<()> {
        if self.max_active == 0 {
            return Err(PoolError::InvalidConfiguration(
                "max_active must be greater than 0".into(),
            ));
        }
        if self.initial_size > self.max_idle || self.max_idle > self.max_active {
            return Err(PoolError::InvalidConfiguration(format!(
                "invalid capacity settings: initial_size ({}) <= max_idle ({}) <= max_active ({}) does not hold",
                self.initial_size, self.max_idle, self.max_active
            )));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - initial_size: 1
    /// - max_idle: 10
    /// - max_active: 10
    /// - idle_timeout: disabled
    /// - ping_timeout: None
    fn default() -> Self {
        Self::new(1, 10, 10)
    }
}
