//! Connection ping implementation

use std::time::Duration;

use connpool_core::ConnectionFactory;
use thiserror::Error;
use tokio::time::Instant;

/// Result of a ping operation, the round-trip time on success
pub type PingResult = Result<Duration, PingError>;

/// Error that can occur during a ping operation
#[derive(Error, Debug, Clone)]
pub enum PingError {
    /// The ping callback reported a failure
    #[error("Ping failed: {0}")]
    Failed(String),
    /// Ping timed out
    #[error("Ping timed out after {0:?}")]
    Timeout(Duration),
}

/// Ping a connection through its factory and measure the round trip
///
/// # Arguments
///
/// * `factory` - The factory that owns the ping callback
/// * `conn` - The connection to check
/// * `timeout` - Upper bound for the ping, `None` waits indefinitely
pub async fn ping_connection<F: ConnectionFactory>(
    factory: &F,
    conn: &mut F::Connection,
    timeout: Option<Duration>,
) -> PingResult {
    let start = Instant::now();

    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, factory.ping(conn))
            .await
            .map_err(|_| PingError::Timeout(limit))?,
        None => factory.ping(conn).await,
    };

    match outcome {
        Ok(()) => Ok(start.elapsed()),
        Err(e) => Err(PingError::Failed(format!("{e:#}"))),
    }
}
