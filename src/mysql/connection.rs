//! Single-session MySQL connection.

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, OptsBuilder, Row as MySqlRow};

use super::error::is_fatal;
use super::types::{from_mysql, to_params};
use crate::config::ConnectOptions;
use crate::driver::{Connection, Connector, Dialect, QueryResult, WriteOutcome};
use crate::error::{HelperError, Result};
use crate::value::SqlValue;

// ============================================================================
// Connector
// ============================================================================

/// Opens MySQL sessions from `ConnectOptions`.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    options: ConnectOptions,
    opts: Opts,
}

impl MySqlConnector {
    pub fn new(options: ConnectOptions) -> Result<Self> {
        if options.charset.is_empty()
            || !options
                .charset
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(HelperError::Config(format!(
                "invalid charset: {:?}",
                options.charset
            )));
        }

        let init = vec![
            format!("SET NAMES {}", options.charset),
            format!("SET autocommit={}", options.autocommit as u8),
        ];
        let opts: Opts = OptsBuilder::from_opts(Opts::default())
            .ip_or_hostname(options.host.clone())
            .tcp_port(options.port)
            .user(Some(options.user.clone()))
            .pass(options.password.clone())
            .db_name(options.database.clone())
            .init(init)
            .into();

        Ok(Self { options, opts })
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    type Connection = MySqlConnection;

    async fn connect(&self) -> Result<MySqlConnection> {
        tracing::debug!(
            host = %self.options.host,
            port = self.options.port,
            database = ?self.options.database,
            "opening MySQL connection"
        );
        let conn = Conn::new(self.opts.clone()).await?;
        Ok(MySqlConnection {
            conn: Some(conn),
            opts: self.opts.clone(),
            autocommit: self.options.autocommit,
        })
    }

    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }
}

// ============================================================================
// Connection
// ============================================================================

/// One MySQL session. Dropped to `None` once the session is known broken.
pub struct MySqlConnection {
    conn: Option<Conn>,
    opts: Opts,
    autocommit: bool,
}

impl MySqlConnection {
    fn session(&mut self) -> Result<&mut Conn> {
        self.conn
            .as_mut()
            .ok_or_else(|| HelperError::Connection("connection is closed".to_string()))
    }

    /// Classify a driver error, forgetting the session if it cannot recover.
    fn fail(&mut self, e: mysql_async::Error) -> HelperError {
        if is_fatal(&e) {
            tracing::warn!(error = %e, "MySQL session lost");
            self.conn = None;
        }
        HelperError::from(e)
    }

    async fn reconnect(&mut self) -> Result<()> {
        if let Some(old) = self.conn.take() {
            // the old session is already unusable
            let _ = old.disconnect().await;
        }
        let conn = Conn::new(self.opts.clone()).await?;
        self.conn = Some(conn);
        tracing::info!("MySQL session re-established");
        Ok(())
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    async fn ping(&mut self, reconnect: bool) -> Result<()> {
        let result = match self.conn.as_mut() {
            Some(conn) => conn.ping().await,
            None if reconnect => return self.reconnect().await,
            None => return Err(HelperError::Connection("connection is closed".to_string())),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if reconnect => {
                tracing::debug!(error = %e, "ping failed, reconnecting");
                self.reconnect().await
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<WriteOutcome> {
        let conn = self.session()?;
        // text protocol for plain statements, prepared protocol when binding
        let result = if params.is_empty() {
            conn.query_drop(sql).await
        } else {
            conn.exec_drop(sql, to_params(params)).await
        };
        let outcome = result.map(|()| WriteOutcome {
            rows_affected: conn.affected_rows(),
            last_insert_id: conn.last_insert_id(),
        });
        let outcome = outcome.map_err(|e| self.fail(e))?;
        tracing::debug!(rows_affected = outcome.rows_affected, "statement executed");
        Ok(outcome)
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        let conn = self.session()?;
        let result: std::result::Result<Vec<MySqlRow>, _> = if params.is_empty() {
            conn.query(sql).await
        } else {
            conn.exec(sql, to_params(params)).await
        };
        let mysql_rows = result.map_err(|e| self.fail(e))?;

        let mut columns = Vec::new();
        let mut column_types = Vec::new();
        if let Some(first) = mysql_rows.first() {
            for col in first.columns_ref() {
                columns.push(col.name_str().to_string());
                column_types.push(col.column_type());
            }
        }

        let rows = mysql_rows
            .into_iter()
            .map(|row| {
                column_types
                    .iter()
                    .enumerate()
                    .map(|(idx, col_type)| {
                        let val: mysql_async::Value = row.get(idx).unwrap_or(mysql_async::Value::NULL);
                        from_mysql(val, *col_type)
                    })
                    .collect()
            })
            .collect::<Vec<Vec<SqlValue>>>();

        tracing::debug!(row_count = rows.len(), "query executed");
        Ok(QueryResult::new(columns, rows))
    }

    async fn commit(&mut self) -> Result<()> {
        if self.autocommit {
            return Ok(());
        }
        let conn = self.session()?;
        let result = conn.query_drop("COMMIT").await;
        result.map_err(|e| self.fail(e))
    }

    async fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => conn.disconnect().await.map_err(HelperError::from),
            None => Ok(()),
        }
    }
}
