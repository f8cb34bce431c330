//! Borrowed connection guard

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use connpool_core::{ConnectionFactory, Result};

use super::pool::{Checkin, Pool};

/// A connection borrowed from the pool
///
/// When dropped, the connection is returned to the pool. If the idle store
/// is full the close runs on the current tokio runtime. Use
/// [`PooledConnection::put`] to observe the close result instead.
pub struct PooledConnection<F: ConnectionFactory> {
    connection: Option<F::Connection>,
    pool: Arc<Pool<F>>,
}

impl<F: ConnectionFactory> PooledConnection<F> {
    pub(super) fn new(connection: F::Connection, pool: Arc<Pool<F>>) -> Self {
        Self {
            connection: Some(connection),
            pool,
        }
    }

    /// Return the connection and wait for the outcome
    pub async fn put(mut self) -> Result<()> {
        match self.connection.take() {
            Some(conn) => self.pool.put(conn).await,
            None => Ok(()),
        }
    }

    /// Close the connection instead of returning it
    pub async fn close(mut self) -> Result<()> {
        match self.connection.take() {
            Some(conn) => self.pool.close(conn).await,
            None => Ok(()),
        }
    }

    /// Take the connection out of the pool's accounting
    ///
    /// The caller becomes responsible for closing it.
    pub fn detach(mut self) -> Option<F::Connection> {
        let conn = self.connection.take();
        if conn.is_some() {
            self.pool.forget();
        }
        conn
    }

    /// Get the pool this connection came from
    pub fn pool(&self) -> &Arc<Pool<F>> {
        &self.pool
    }
}

impl<F: ConnectionFactory> Deref for PooledConnection<F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        match &self.connection {
            Some(conn) => conn,
            None => unreachable!("connection is only taken by consuming methods"),
        }
    }
}

impl<F: ConnectionFactory> DerefMut for PooledConnection<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.connection {
            Some(conn) => conn,
            None => unreachable!("connection is only taken by consuming methods"),
        }
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            match self.pool.checkin(conn) {
                Checkin::Idle | Checkin::HandedOff => {}
                Checkin::Close(conn) | Checkin::Foreign(conn) => {
                    self.pool.close_in_background(conn);
                }
            }
        }
    }
}
