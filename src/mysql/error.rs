//! Mapping of mysql_async failures onto `HelperError`.

use mysql_async::DriverError;

use crate::error::HelperError;

impl From<mysql_async::Error> for HelperError {
    fn from(e: mysql_async::Error) -> Self {
        match e {
            mysql_async::Error::Server(server) => HelperError::Rejected(format!(
                "{} (code {}, state {})",
                server.message, server.code, server.state
            )),
            mysql_async::Error::Url(e) => HelperError::Config(e.to_string()),
            mysql_async::Error::Driver(driver) if is_parameter_error(&driver) => {
                HelperError::InvalidStatement(driver.to_string())
            }
            other => HelperError::Connection(other.to_string()),
        }
    }
}

/// Parameters that don't fit the statement. Caught before anything is sent.
fn is_parameter_error(e: &DriverError) -> bool {
    matches!(
        e,
        DriverError::StmtParamsMismatch { .. }
            | DriverError::MixedParams
            | DriverError::NamedParamsForPositionalQuery
    )
}

/// Whether the session that produced `e` can keep serving statements.
///
/// A server-side refusal or a parameter mistake leaves the session intact.
pub(crate) fn is_fatal(e: &mysql_async::Error) -> bool {
    match e {
        mysql_async::Error::Server(_) => false,
        mysql_async::Error::Driver(driver) => !is_parameter_error(driver),
        _ => true,
    }
}
