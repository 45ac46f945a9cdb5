//! Error types for mysqlkit.
//!
//! Backend errors are classified at the driver boundary so callers can
//! branch on [`ErrorKind`] instead of matching driver-specific types.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelperError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Pool exhausted: all {0} connections are in use")]
    PoolExhausted(usize),

    #[error("Pool closed")]
    PoolClosed,

    #[error("Statement timed out after {0:?}")]
    Timeout(Duration),

    #[error("Statement rejected by server: {0}")]
    Rejected(String),

    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse failure category of a [`HelperError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The server could not be reached or the connection broke.
    Connection,
    /// No connection could be checked out of the pool.
    Pool,
    /// The write window elapsed before the statement finished.
    Timeout,
    /// The server refused the statement (syntax, constraint, permissions).
    Rejected,
    /// The statement or configuration was malformed before reaching the server.
    Invalid,
    /// Local file I/O failed.
    Io,
}

impl HelperError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HelperError::Connection(_) => ErrorKind::Connection,
            HelperError::PoolExhausted(_) | HelperError::PoolClosed => ErrorKind::Pool,
            HelperError::Timeout(_) => ErrorKind::Timeout,
            HelperError::Rejected(_) => ErrorKind::Rejected,
            HelperError::InvalidStatement(_) | HelperError::Config(_) | HelperError::Json(_) => {
                ErrorKind::Invalid
            }
            HelperError::Io(_) => ErrorKind::Io,
        }
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, HelperError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, HelperError>;
