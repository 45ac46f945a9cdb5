//! Backend seam between the pool/helper and concrete database drivers.

use async_trait::async_trait;

use crate::error::Result;
use crate::value::{Row, SqlValue};

/// SQL flavour spoken by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    /// Query returning the id generated by the last insert on the connection.
    pub fn last_insert_id_sql(self) -> &'static str {
        match self {
            Dialect::MySql => "SELECT LAST_INSERT_ID();",
            Dialect::Sqlite => "SELECT last_insert_rowid();",
        }
    }

    /// Character that delimits a quoted identifier.
    pub(crate) fn identifier_quote(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Sqlite => '"',
        }
    }

    /// Clause joining the insert part of an upsert to its `col=?` list.
    pub(crate) fn upsert_clause(self) -> &'static str {
        match self {
            Dialect::MySql => " ON DUPLICATE KEY UPDATE ",
            Dialect::Sqlite => " ON CONFLICT DO UPDATE SET ",
        }
    }
}

/// Rows returned by a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First cell of the first row, if any.
    pub fn scalar(&self) -> Option<&SqlValue> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Convert every row into a column-name -> value mapping.
    pub fn into_rows(self) -> Vec<Row> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|values| columns.iter().cloned().zip(values).collect())
            .collect()
    }
}

/// What a successful write reports back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub rows_affected: u64,
    /// Id generated by this statement, read on the same connection
    pub last_insert_id: Option<u64>,
}

/// A single live database connection.
#[async_trait]
pub trait Connection: Send + 'static {
    fn dialect(&self) -> Dialect;

    /// Whether the connection is known to be unusable.
    fn is_closed(&self) -> bool;

    /// Check liveness; when `reconnect` is set, re-establish a dead session
    /// in place instead of failing.
    async fn ping(&mut self, reconnect: bool) -> Result<()>;

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<WriteOutcome>;

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult>;

    /// Commit the current transaction. A no-op under autocommit.
    async fn commit(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Factory for new connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;

    async fn connect(&self) -> Result<Self::Connection>;

    fn dialect(&self) -> Dialect;
}
