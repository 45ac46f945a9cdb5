//! mysqlkit - pooled MySQL helper with a SQLite backend.
//!
//! [`DbHelper`] owns a bounded connection [`Pool`] and offers the usual
//! convenience operations: raw writes with a timeout, reads into ordered
//! rows, inserts and upserts built from a field mapping, and append-only
//! SQL dump files.

pub mod config;
pub mod driver;
pub mod dump;
pub mod error;
pub mod helper;
pub mod mysql;
pub mod pool;
pub mod sqlite;
pub mod statement;
pub mod value;

#[cfg(test)]
mod mock;

pub use config::{Config, ConnectOptions, HelperConfig, PingPolicy, PoolConfig};
pub use driver::{Connection, Connector, Dialect, QueryResult, WriteOutcome};
pub use dump::SqlDump;
pub use error::{ErrorKind, HelperError, Result};
pub use helper::DbHelper;
pub use mysql::MySqlConnector;
pub use pool::{Pool, PoolStatus, PooledConnection};
pub use sqlite::SqliteConnector;
pub use statement::Statement;
pub use value::{Fields, JsonValue, Row, SqlValue};
