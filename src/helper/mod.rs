//! `DbHelper`: pooled convenience operations.
//!
//! Every operation comes in two flavours. The `try_*` methods return a
//! classified [`Result`]; the plain methods keep the sentinel contract
//! (`bool` for writes, an empty `Vec` for reads) and log failures instead
//! of returning them.
//!
//! ```no_run
//! use mysqlkit::{fields, ConnectOptions, DbHelper, SqlValue};
//!
//! # async fn run() -> mysqlkit::Result<()> {
//! let options = ConnectOptions::new("127.0.0.1", "root", "secret", "shop", 3306, "utf8mb4");
//! let db = DbHelper::new(options).await?;
//!
//! let outcome = db.try_insert("users", &fields! { "id" => 1, "name" => "Bob" }).await?;
//! assert_eq!(outcome.rows_affected, 1);
//!
//! for row in db.get_all("SELECT id, name FROM users WHERE id = ?", [SqlValue::Int(1)]).await {
//!     println!("{:?}", row);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use crate::config::{Config, ConnectOptions, HelperConfig};
use crate::driver::{Connector, Dialect, WriteOutcome};
use crate::dump::SqlDump;
use crate::error::{HelperError, Result};
use crate::mysql::MySqlConnector;
use crate::pool::{Pool, PoolStatus, PooledConnection};
use crate::statement::Statement;
use crate::value::{Fields, Row, SqlValue};


/// Pooled database helper.
pub struct DbHelper<C: Connector = MySqlConnector> {
    pool: Pool<C>,
    dump: SqlDump,
    write_timeout: Duration,
    write_retries: u32,
    read_timeout: Option<Duration>,
}

impl DbHelper<MySqlConnector> {
    /// Connect to MySQL with the default pool policy and timeouts.
    pub async fn new(options: ConnectOptions) -> Result<Self> {
        Self::with_connector(MySqlConnector::new(options)?, HelperConfig::default()).await
    }

    /// Build from a loaded configuration file.
    pub async fn from_config(config: Config) -> Result<Self> {
        Self::with_connector(MySqlConnector::new(config.connection)?, config.helper).await
    }
}

impl<C: Connector> DbHelper<C> {
    /// Build over any backend. Opens the pool's `min_cached` connections
    /// before returning.
    pub async fn with_connector(connector: C, config: HelperConfig) -> Result<Self> {
        config.validate()?;
        let write_timeout = config.write_timeout();
        let read_timeout = config.read_timeout();
        let pool = Pool::connect(connector, config.pool).await?;
        Ok(Self {
            pool,
            dump: SqlDump::new(config.dump_dir),
            write_timeout,
            write_retries: config.write_retries,
            read_timeout,
        })
    }

    pub fn pool(&self) -> &Pool<C> {
        &self.pool
    }

    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    pub fn dialect(&self) -> Dialect {
        self.pool.dialect()
    }

    /// Close the pool. Borrowed connections are closed when they come back.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Borrow a connection; it goes back to the pool when dropped.
    pub async fn connect(&self) -> Result<PooledConnection<C>> {
        self.pool.acquire().await
    }

    // ========================================================================
    // Write path
    // ========================================================================

    /// Run a write inside the write timeout, retrying timeouts up to
    /// `write_retries` extra times.
    #[tracing::instrument(skip(self, stmt), fields(sql_preview = %stmt.preview()))]
    pub async fn try_execute(&self, stmt: &Statement) -> Result<WriteOutcome> {
        let mut attempt = 0;
        loop {
            match self.write_once(stmt).await {
                Err(e) if e.is_timeout() && attempt < self.write_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, retries = self.write_retries, "write timed out, retrying");
                }
                result => return result,
            }
        }
    }

    /// Checkout, ping, execute and commit under one deadline. On timeout
    /// the in-flight connection is dropped and the pool discards it.
    async fn write_once(&self, stmt: &Statement) -> Result<WriteOutcome> {
        let work = async {
            let mut conn = self.pool.acquire().await?;
            conn.ping(true).await?;
            let outcome = conn.execute(stmt.sql(), stmt.params()).await?;
            conn.commit().await?;
            Ok::<_, HelperError>(outcome)
        };
        match tokio::time::timeout(self.write_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(HelperError::Timeout(self.write_timeout)),
        }
    }

    /// Run a write; `true` on success, `false` on any failure.
    pub async fn execute(&self, sql: &str, params: impl IntoIterator<Item = SqlValue>) -> bool {
        let stmt = Statement::new(sql, params);
        self.report_write(self.try_execute(&stmt).await)
    }

    fn report_write(&self, result: Result<WriteOutcome>) -> bool {
        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind(), "write failed");
                false
            }
        }
    }

    // ========================================================================
    // Read path
    // ========================================================================

    /// Fetch every row of a query. An empty vector means no rows.
    #[tracing::instrument(skip(self, stmt), fields(sql_preview = %stmt.preview()))]
    pub async fn try_get_all(&self, stmt: &Statement) -> Result<Vec<Row>> {
        let work = async {
            let mut conn = self.pool.acquire().await?;
            let result = conn.query(stmt.sql(), stmt.params()).await?;
            Ok::<_, HelperError>(result.into_rows())
        };
        match self.read_timeout {
            Some(window) => tokio::time::timeout(window, work)
                .await
                .unwrap_or(Err(HelperError::Timeout(window))),
            None => work.await,
        }
    }

    /// Fetch every row; empty on failure.
    pub async fn get_all(&self, sql: &str, params: impl IntoIterator<Item = SqlValue>) -> Vec<Row> {
        let stmt = Statement::new(sql, params);
        match self.try_get_all(&stmt).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind(), "query failed");
                Vec::new()
            }
        }
    }

    /// Rows of the dialect's last-insert-id query, empty on failure.
    ///
    /// Runs on whichever connection the pool hands out; prefer the
    /// `last_insert_id` of the `WriteOutcome` returned by [`Self::try_insert`].
    pub async fn get_last_insert_id(&self) -> Vec<Row> {
        self.get_all(self.dialect().last_insert_id_sql(), []).await
    }

    pub async fn last_insert_id(&self) -> Result<Option<u64>> {
        let stmt = Statement::raw(self.dialect().last_insert_id_sql());
        let rows = self.try_get_all(&stmt).await?;
        Ok(rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(SqlValue::as_u64))
    }

    // ========================================================================
    // Inserts and updates
    // ========================================================================

    pub async fn try_insert(&self, table: &str, fields: &Fields) -> Result<WriteOutcome> {
        let stmt = Statement::insert(self.dialect(), table, fields)?;
        self.try_execute(&stmt).await
    }

    /// Insert one row; `true` on success.
    pub async fn insert(&self, table: &str, fields: &Fields) -> bool {
        let result = self.try_insert(table, fields).await;
        self.report_write(result)
    }

    pub async fn try_insert_or_update(&self, table: &str, fields: &Fields) -> Result<WriteOutcome> {
        let stmt = Statement::upsert(self.dialect(), table, fields)?;
        self.try_execute(&stmt).await
    }

    /// Insert one row, or update every given column when the key exists.
    pub async fn insert_or_update(&self, table: &str, fields: &Fields) -> bool {
        let result = self.try_insert_or_update(table, fields).await;
        self.report_write(result)
    }

    pub async fn try_update(&self, sql: &str) -> Result<WriteOutcome> {
        self.try_execute(&Statement::raw(sql)).await
    }

    /// Run caller-supplied SQL as-is on the write path.
    pub async fn update(&self, sql: &str) -> bool {
        let result = self.try_update(sql).await;
        self.report_write(result)
    }

    // ========================================================================
    // Dump files
    // ========================================================================

    pub fn dump(&self) -> &SqlDump {
        &self.dump
    }

    /// Append `INSERT IGNORE INTO ...` to `<dump_dir>/<table>.sql`.
    pub async fn file_insert(&self, table: &str, fields: &Fields) -> Result<()> {
        let stmt = Statement::insert_ignore(table, fields)?;
        self.dump.append(table, &stmt).await?;
        Ok(())
    }

    /// Append a MySQL upsert to `<dump_dir>/<table>.sql`.
    pub async fn file_insert_or_update(&self, table: &str, fields: &Fields) -> Result<()> {
        let stmt = Statement::upsert(Dialect::MySql, table, fields)?;
        self.dump.append(table, &stmt).await?;
        Ok(())
    }
}
