//! Scripted in-memory backend for pool and helper tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::driver::{Connection, Connector, Dialect, QueryResult, WriteOutcome};
use crate::error::{HelperError, Result};
use crate::value::SqlValue;

/// How `execute` / `query` respond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ExecBehavior {
    #[default]
    Succeed,
    /// Server refuses the statement; the connection stays usable
    Reject,
    /// The session breaks
    Disconnect,
    /// Never answers
    Hang,
    /// Answers after the given delay
    Delay(Duration),
}

#[derive(Default)]
pub(crate) struct MockState {
    connects: AtomicUsize,
    closes: AtomicUsize,
    pings: AtomicUsize,
    reconnects: AtomicUsize,
    next_insert_id: AtomicU64,
    /// Bumped to kill every open session without the client noticing
    generation: AtomicU64,
    fail_connect: AtomicBool,
    exec: Mutex<ExecBehavior>,
    query: Mutex<ExecBehavior>,
    query_result: Mutex<QueryResult>,
    /// Every statement that reached a connection, with its parameters
    log: Mutex<Vec<(String, Vec<SqlValue>)>>,
}

impl MockState {
    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub(crate) fn reconnects(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Server-side restart: open sessions die but still report as open
    /// until they are next used.
    pub(crate) fn drop_sessions(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn set_exec(&self, behavior: ExecBehavior) {
        *self.exec.lock() = behavior;
    }

    pub(crate) fn set_query(&self, behavior: ExecBehavior) {
        *self.query.lock() = behavior;
    }

    pub(crate) fn set_query_result(&self, result: QueryResult) {
        *self.query_result.lock() = result;
    }

    pub(crate) fn statements(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.log.lock().clone()
    }
}

pub(crate) struct MockConnector {
    state: Arc<MockState>,
    dialect: Dialect,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::with_dialect(Dialect::MySql)
    }

    pub(crate) fn with_dialect(dialect: Dialect) -> Self {
        Self {
            state: Arc::new(MockState::default()),
            dialect,
        }
    }

    pub(crate) fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self) -> Result<MockConnection> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(HelperError::Connection("connection refused".to_string()));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            generation: self.state.generation.load(Ordering::SeqCst),
            state: Arc::clone(&self.state),
            dialect: self.dialect,
            closed: false,
        })
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }
}

pub(crate) struct MockConnection {
    state: Arc<MockState>,
    /// Session generation this connection belongs to
    generation: u64,
    dialect: Dialect,
    closed: bool,
}

impl MockConnection {
    fn session_alive(&self) -> bool {
        self.generation == self.state.generation.load(Ordering::SeqCst)
    }

    async fn respond(&mut self, behavior: ExecBehavior) -> Result<()> {
        match behavior {
            ExecBehavior::Succeed => Ok(()),
            ExecBehavior::Reject => Err(HelperError::Rejected(
                "You have an error in your SQL syntax".to_string(),
            )),
            ExecBehavior::Disconnect => {
                self.closed = true;
                Err(HelperError::Connection("server has gone away".to_string()))
            }
            ExecBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
                Ok(())
            }
            ExecBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn ping(&mut self, reconnect: bool) -> Result<()> {
        self.state.pings.fetch_add(1, Ordering::SeqCst);
        if self.closed || !self.session_alive() {
            if !reconnect {
                self.closed = true;
                return Err(HelperError::Connection("server has gone away".to_string()));
            }
            self.state.reconnects.fetch_add(1, Ordering::SeqCst);
            self.generation = self.state.generation.load(Ordering::SeqCst);
            self.closed = false;
        }
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<WriteOutcome> {
        if !self.session_alive() {
            self.closed = true;
            return Err(HelperError::Connection("server has gone away".to_string()));
        }
        self.state.log.lock().push((sql.to_string(), params.to_vec()));
        let behavior = *self.state.exec.lock();
        self.respond(behavior).await?;
        let id = self.state.next_insert_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(WriteOutcome {
            rows_affected: 1,
            last_insert_id: Some(id),
        })
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        if !self.session_alive() {
            self.closed = true;
            return Err(HelperError::Connection("server has gone away".to_string()));
        }
        self.state.log.lock().push((sql.to_string(), params.to_vec()));
        let behavior = *self.state.query.lock();
        self.respond(behavior).await?;
        Ok(self.state.query_result.lock().clone())
    }

    async fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
