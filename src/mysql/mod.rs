//! MySQL / MariaDB backend.
//!
//! Built on mysql_async. Each `MySqlConnection` owns exactly one server
//! session; pooling is done by `crate::pool`.

pub mod connection;
pub mod error;
pub mod types;


pub use connection::{MySqlConnection, MySqlConnector};
