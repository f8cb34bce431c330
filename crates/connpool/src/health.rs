//! Liveness checks for pooled connections
//!
//! The pool pings a connection before handing it out of the idle store when
//! the factory provides a ping. A ping can be bounded by a timeout, and a
//! ping that runs out of time counts as a failure.

mod ping;

pub use ping::{PingError, PingResult, ping_connection};
