//! Classification of SQLite failures into `HelperError`.

use rusqlite::ffi::ErrorCode;

use crate::error::HelperError;

impl From<rusqlite::Error> for HelperError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::SystemIoFailure
                | ErrorCode::PermissionDenied => HelperError::Connection(e.to_string()),
                _ => HelperError::Rejected(e.to_string()),
            },
            rusqlite::Error::InvalidParameterCount(..)
            | rusqlite::Error::InvalidParameterName(_)
            | rusqlite::Error::ToSqlConversionFailure(_)
            | rusqlite::Error::MultipleStatement => HelperError::InvalidStatement(e.to_string()),
            _ => HelperError::Rejected(e.to_string()),
        }
    }
}

impl From<tokio_rusqlite::Error> for HelperError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        match e {
            tokio_rusqlite::Error::Rusqlite(e) => HelperError::from(e),
            tokio_rusqlite::Error::ConnectionClosed => {
                HelperError::Connection("connection is closed".to_string())
            }
            other => HelperError::Connection(other.to_string()),
        }
    }
}
