//! SQLite backend.
//!
//! Uses rusqlite with tokio-rusqlite for async support. Speaks the same
//! `?` placeholder syntax as MySQL, which makes it the local stand-in for
//! helper tests and embedded deployments.

pub mod connection;
pub mod error;
pub mod types;

#[cfg(test)]
mod tests;

pub use connection::{SqliteConnection, SqliteConnector};
