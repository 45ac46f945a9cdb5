//! Bounded connection pool.
//!
//! A semaphore caps the number of connections checked out at once, idle
//! connections are kept in a LIFO list, and connections are handed back to
//! the pool when their `PooledConnection` guard is dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::config::{PingPolicy, PoolConfig};
use crate::driver::{Connection, Connector, Dialect, QueryResult, WriteOutcome};
use crate::error::{HelperError, Result};
use crate::value::SqlValue;

// ============================================================================
// Pooled Connection
// ============================================================================

/// A connection checked out from the pool.
///
/// When dropped, the connection is returned to the pool, unless it is
/// closed, worn out by `max_usage`, or was dropped in the middle of an
/// operation (e.g. by a timeout), in which case it is discarded.
pub struct PooledConnection<C: Connector> {
    /// The actual connection (None once released)
    conn: Option<C::Connection>,
    /// Checkouts including this one
    uses: u32,
    /// Set while an operation is awaiting the server
    in_flight: bool,
    pool: Arc<PoolInner<C>>,
    _permit: OwnedSemaphorePermit,
}

impl<C: Connector> PooledConnection<C> {
    fn conn_mut(&mut self) -> Result<&mut C::Connection> {
        self.conn
            .as_mut()
            .ok_or_else(|| HelperError::Connection("connection already released".to_string()))
    }

    /// Check liveness, re-establishing the session if `reconnect` is set.
    pub async fn ping(&mut self, reconnect: bool) -> Result<()> {
        self.in_flight = true;
        let result = self.conn_mut()?.ping(reconnect).await;
        self.in_flight = false;
        result
    }

    /// Execute a statement that doesn't return rows.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<WriteOutcome> {
        self.in_flight = true;
        let result = self.conn_mut()?.execute(sql, params).await;
        self.in_flight = false;
        result
    }

    /// Execute a query and collect every row.
    pub async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        self.in_flight = true;
        let result = self.conn_mut()?.query(sql, params).await;
        self.in_flight = false;
        result
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.in_flight = true;
        let result = self.conn_mut()?.commit().await;
        self.in_flight = false;
        result
    }

    pub fn dialect(&self) -> Dialect {
        self.pool.connector.dialect()
    }

    /// Check if the connection is healthy.
    pub fn is_healthy(&self) -> bool {
        self.conn.as_ref().map(|c| !c.is_closed()).unwrap_or(false)
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.uses, self.in_flight);
        }
    }
}

// ============================================================================
// Pool Inner
// ============================================================================

struct IdleConnection<T> {
    conn: T,
    uses: u32,
}

struct PoolInner<C: Connector> {
    config: PoolConfig,
    connector: C,
    /// Idle connections waiting to be used
    idle: Mutex<Vec<IdleConnection<C::Connection>>>,
    /// Limits checked-out connections
    semaphore: Arc<Semaphore>,
    /// Connections currently open (idle + checked out)
    open: AtomicUsize,
}

impl<C: Connector> PoolInner<C> {
    async fn open_connection(&self) -> Result<C::Connection> {
        let conn = self.connector.connect().await?;
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(conn)
    }

    fn release(&self, conn: C::Connection, uses: u32, in_flight: bool) {
        let worn_out = self.config.max_usage.is_some_and(|max| uses >= max);
        if in_flight || worn_out || conn.is_closed() || self.semaphore.is_closed() {
            tracing::debug!(in_flight, worn_out, "discarding pooled connection");
            self.discard(conn);
            return;
        }

        let mut idle = self.idle.lock();
        if idle.len() < self.config.max_cached {
            idle.push(IdleConnection { conn, uses });
        } else {
            drop(idle);
            self.discard(conn);
        }
    }

    /// Close a connection without blocking the caller.
    fn discard(&self, mut conn: C::Connection) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = conn.close().await {
                    tracing::debug!(error = %e, "error closing discarded connection");
                }
            });
        }
    }
}

// ============================================================================
// Connection Pool
// ============================================================================

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub open: usize,
    pub idle: usize,
    pub in_use: usize,
    pub max_connections: usize,
}

/// A bounded pool of connections produced by a [`Connector`].
pub struct Pool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> Pool<C> {
    /// Create the pool and open `min_cached` connections up front.
    pub async fn connect(connector: C, config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let inner = Arc::new(PoolInner {
            semaphore: Arc::new(Semaphore::new(config.max_connections)),
            idle: Mutex::new(Vec::with_capacity(config.max_cached)),
            open: AtomicUsize::new(0),
            connector,
            config,
        });

        let pool = Self { inner };

        for _ in 0..pool.inner.config.min_cached {
            let conn = pool.inner.open_connection().await?;
            pool.inner.idle.lock().push(IdleConnection { conn, uses: 0 });
        }

        tracing::info!(
            dialect = ?pool.inner.connector.dialect(),
            min_cached = pool.inner.config.min_cached,
            max_cached = pool.inner.config.max_cached,
            max_connections = pool.inner.config.max_connections,
            "connection pool created"
        );

        Ok(pool)
    }

    /// Get a connection from the pool.
    ///
    /// Waits for a free slot when the pool is exhausted and `blocking` is
    /// set, otherwise fails with `PoolExhausted`.
    pub async fn acquire(&self) -> Result<PooledConnection<C>> {
        let semaphore = Arc::clone(&self.inner.semaphore);
        let permit = if self.inner.config.blocking {
            semaphore
                .acquire_owned()
                .await
                .map_err(|_| HelperError::PoolClosed)?
        } else {
            semaphore.try_acquire_owned().map_err(|e| match e {
                TryAcquireError::NoPermits => {
                    HelperError::PoolExhausted(self.inner.config.max_connections)
                }
                TryAcquireError::Closed => HelperError::PoolClosed,
            })?
        };

        let idle = self.inner.idle.lock().pop();

        let (conn, uses) = match idle {
            Some(idle) if !idle.conn.is_closed() => (idle.conn, idle.uses),
            Some(stale) => {
                self.inner.discard(stale.conn);
                (self.inner.open_connection().await?, 0)
            }
            None => (self.inner.open_connection().await?, 0),
        };

        let mut pooled = PooledConnection {
            conn: Some(conn),
            uses: uses + 1,
            in_flight: false,
            pool: Arc::clone(&self.inner),
            _permit: permit,
        };

        if self.inner.config.ping == PingPolicy::OnCheckout {
            pooled.ping(true).await?;
        }

        Ok(pooled)
    }

    /// Stop handing out connections and close the idle ones.
    ///
    /// Connections still checked out are closed as they come back.
    pub async fn close(&self) {
        self.inner.semaphore.close();

        let connections = {
            let mut idle = self.inner.idle.lock();
            std::mem::take(&mut *idle)
        };

        for mut idle in connections {
            self.inner.open.fetch_sub(1, Ordering::SeqCst);
            let _ = idle.conn.close().await;
        }

        tracing::info!("connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.semaphore.is_closed()
    }

    pub fn status(&self) -> PoolStatus {
        let max_connections = self.inner.config.max_connections;
        PoolStatus {
            open: self.inner.open.load(Ordering::SeqCst),
            idle: self.inner.idle.lock().len(),
            in_use: max_connections.saturating_sub(self.inner.semaphore.available_permits()),
            max_connections,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.connector.dialect()
    }
}
