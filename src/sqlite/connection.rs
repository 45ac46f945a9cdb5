//! SQLite connection implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::driver::{Connection, Connector, Dialect, QueryResult, WriteOutcome};
use crate::error::{HelperError, Result};
use crate::value::SqlValue;

use super::types::from_value_ref;

const MEMORY: &str = ":memory:";

/// Opens SQLite connections to one database file.
///
/// `:memory:` is accepted, but every pooled connection then gets its own
/// private database.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
}

impl SqliteConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    type Connection = SqliteConnection;

    async fn connect(&self) -> Result<SqliteConnection> {
        SqliteConnection::open(&self.path).await
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}

/// Rowid generated by a write, if it inserted a row.
///
/// `last_insert_rowid` is left untouched by statements that insert nothing,
/// including an upsert that took its update branch. An upsert that keeps the
/// previous rowid is therefore read as an update.
fn inserted_rowid(sql: &str, changes: usize, before: i64, after: i64) -> Option<u64> {
    let verb: String = sql
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    if changes == 0 || !matches!(verb.as_str(), "INSERT" | "REPLACE") {
        return None;
    }
    if after == before && sql.to_ascii_uppercase().contains("ON CONFLICT") {
        return None;
    }
    u64::try_from(after).ok()
}

/// A SQLite connection.
pub struct SqliteConnection {
    conn: Option<tokio_rusqlite::Connection>,
    path: PathBuf,
}

impl SqliteConnection {
    /// Open a SQLite database.
    ///
    /// Supports:
    /// - `:memory:` for in-memory database
    /// - File path for disk-based database
    ///
    /// File databases run in WAL mode with a busy timeout so pooled
    /// connections can share them.
    pub async fn open(path: &Path) -> Result<Self> {
        let conn = Self::open_raw(path).await?;
        tracing::debug!(path = %path.display(), "opened SQLite connection");
        Ok(Self {
            conn: Some(conn),
            path: path.to_path_buf(),
        })
    }

    async fn open_raw(path: &Path) -> Result<tokio_rusqlite::Connection> {
        let is_memory = path.as_os_str() == MEMORY;
        let conn = if is_memory {
            tokio_rusqlite::Connection::open_in_memory().await?
        } else {
            tokio_rusqlite::Connection::open(path).await?
        };

        if !is_memory {
            conn.call(|c| {
                c.execute_batch(
                    "PRAGMA journal_mode=WAL;
                     PRAGMA synchronous=NORMAL;
                     PRAGMA busy_timeout=5000;
                     PRAGMA cache_size=-64000;", // 64MB cache
                )?;
                Ok(())
            })
            .await?;
        }
        Ok(conn)
    }

    fn handle(&self) -> Result<&tokio_rusqlite::Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| HelperError::Connection("connection is closed".to_string()))
    }

    /// Forget the handle when the background thread has gone away.
    fn track<T>(&mut self, result: std::result::Result<T, tokio_rusqlite::Error>) -> Result<T> {
        result.map_err(|e| {
            if matches!(e, tokio_rusqlite::Error::ConnectionClosed) {
                self.conn = None;
            }
            HelperError::from(e)
        })
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    async fn ping(&mut self, reconnect: bool) -> Result<()> {
        let alive = match &self.conn {
            Some(conn) => conn
                .call(|c| {
                    c.query_row("SELECT 1", [], |_| Ok(()))?;
                    Ok(())
                })
                .await
                .is_ok(),
            None => false,
        };
        if alive {
            return Ok(());
        }
        if !reconnect {
            self.conn = None;
            return Err(HelperError::Connection("connection is closed".to_string()));
        }
        tracing::debug!(path = %self.path.display(), "reopening SQLite connection");
        self.conn = Some(Self::open_raw(&self.path).await?);
        Ok(())
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<WriteOutcome> {
        let sql = sql.to_string();
        let params: Vec<SqlValue> = params.to_vec();

        let result = self
            .handle()?
            .call(move |conn| {
                let before = conn.last_insert_rowid();
                let changes = conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
                let after = conn.last_insert_rowid();
                let id = inserted_rowid(&sql, changes, before, after);
                Ok((changes as u64, id))
            })
            .await;
        let (rows_affected, last_insert_id) = self.track(result)?;
        tracing::debug!(rows_affected, "statement executed");
        Ok(WriteOutcome {
            rows_affected,
            last_insert_id,
        })
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        let sql = sql.to_string();
        let params: Vec<SqlValue> = params.to_vec();

        let result = self
            .handle()?
            .call(move |conn| {
                // prepare_cached makes repeated statements an O(1) lookup
                let mut stmt = conn.prepare_cached(&sql)?;
                let columns: Vec<String> =
                    stmt.column_names().iter().map(|s| s.to_string()).collect();

                let mut rows_data = Vec::new();
                let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
                while let Some(row) = rows.next()? {
                    let mut values = Vec::with_capacity(columns.len());
                    for i in 0..columns.len() {
                        values.push(from_value_ref(row.get_ref(i)?));
                    }
                    rows_data.push(values);
                }
                Ok(QueryResult::new(columns, rows_data))
            })
            .await;
        let result = self.track(result)?;
        tracing::debug!(row_count = result.rows.len(), "query executed");
        Ok(result)
    }

    async fn commit(&mut self) -> Result<()> {
        let result = self
            .handle()?
            .call(|conn| {
                if !conn.is_autocommit() {
                    conn.execute_batch("COMMIT")?;
                }
                Ok(())
            })
            .await;
        self.track(result)
    }

    async fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => conn.close().await.map_err(HelperError::from),
            None => Ok(()),
        }
    }
}
