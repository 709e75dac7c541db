//! Mapping of `mysql_async` errors onto the syncmysql error taxonomy.

use std::io;

use syncmysql_core::error::{
    ConfigError, ConnectionError, ConnectionErrorKind, PoolError, PoolErrorKind, ProtocolError,
    QueryError, QueryErrorKind,
};
use syncmysql_core::Error;

/// Extra information attached to statement errors when tracing is on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// The statement exactly as sent
    pub sql: Option<String>,
    /// Free-form context, typically the caller location
    pub detail: Option<String>,
}

/// Classify a MySQL server error number.
pub fn query_error_kind(code: u16) -> QueryErrorKind {
    match code {
        1064 | 1149 => QueryErrorKind::Syntax,
        1022 | 1048 | 1062 | 1169 | 1216 | 1217 | 1451 | 1452 | 1557 | 3819 => {
            QueryErrorKind::Constraint
        }
        1049 | 1051 | 1054 | 1146 | 1305 => QueryErrorKind::NotFound,
        1044 | 1142 | 1143 | 1227 | 1370 => QueryErrorKind::Permission,
        1264 | 1406 => QueryErrorKind::DataTruncation,
        1213 => QueryErrorKind::Deadlock,
        1205 | 3024 => QueryErrorKind::Timeout,
        1317 => QueryErrorKind::Cancelled,
        _ => QueryErrorKind::Database,
    }
}

fn connection_error(
    kind: ConnectionErrorKind,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
) -> Error {
    Error::Connection(ConnectionError {
        kind,
        message,
        source,
    })
}

fn map_io(err: mysql_async::IoError, connecting: bool) -> Error {
    match err {
        mysql_async::IoError::Io(io_err) => {
            let kind = if io_err.kind() == io::ErrorKind::ConnectionRefused {
                ConnectionErrorKind::Refused
            } else if connecting {
                ConnectionErrorKind::Connect
            } else {
                ConnectionErrorKind::Disconnected
            };
            connection_error(kind, io_err.to_string(), Some(Box::new(io_err)))
        }
        #[allow(unreachable_patterns)]
        tls => connection_error(
            ConnectionErrorKind::Ssl,
            tls.to_string(),
            Some(Box::new(tls)),
        ),
    }
}

fn map_driver(err: mysql_async::DriverError, connecting: bool) -> Error {
    use mysql_async::DriverError;

    match err {
        DriverError::PoolDisconnected => Error::Pool(PoolError {
            kind: PoolErrorKind::Closed,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }),
        DriverError::NoClientSslFlagFromServer => connection_error(
            ConnectionErrorKind::Ssl,
            err.to_string(),
            Some(Box::new(err)),
        ),
        DriverError::MysqlOldPasswordDisabled | DriverError::CleartextPluginDisabled => {
            connection_error(
                ConnectionErrorKind::Authentication,
                err.to_string(),
                Some(Box::new(err)),
            )
        }
        DriverError::ConnectionClosed => connection_error(
            if connecting {
                ConnectionErrorKind::Connect
            } else {
                ConnectionErrorKind::Disconnected
            },
            err.to_string(),
            Some(Box::new(err)),
        ),
        other if connecting => connection_error(
            ConnectionErrorKind::Connect,
            other.to_string(),
            Some(Box::new(other)),
        ),
        other => Error::Protocol(ProtocolError {
            message: other.to_string(),
            source: Some(Box::new(other)),
        }),
    }
}

fn map_common(err: mysql_async::Error, connecting: bool) -> Result<Error, mysql_async::ServerError> {
    match err {
        mysql_async::Error::Server(server) => Err(server),
        mysql_async::Error::Io(io_err) => Ok(map_io(io_err, connecting)),
        mysql_async::Error::Driver(driver) => Ok(map_driver(driver, connecting)),
        mysql_async::Error::Url(url) => Ok(Error::Config(ConfigError {
            message: url.to_string(),
            source: Some(Box::new(url)),
        })),
        mysql_async::Error::Other(other) => Ok(Error::Protocol(ProtocolError {
            message: other.to_string(),
            source: Some(other),
        })),
    }
}

/// Map an error raised while opening a session.
///
/// Access-denied server errors become `Authentication`; any other server
/// error at this stage is a failed connect.
pub fn map_connect_error(err: mysql_async::Error) -> Error {
    match map_common(err, true) {
        Ok(mapped) => mapped,
        Err(server) => {
            let kind = match server.code {
                1044 | 1045 | 1698 | 1862 => ConnectionErrorKind::Authentication,
                _ => ConnectionErrorKind::Connect,
            };
            let message = format!("ERROR {} ({}): {}", server.code, server.state, server.message);
            connection_error(kind, message, Some(Box::new(server)))
        }
    }
}

/// Map an error raised while running a statement.
pub fn map_statement_error(err: mysql_async::Error, ctx: &ErrorContext) -> Error {
    match map_common(err, false) {
        Ok(mapped) => mapped,
        Err(server) => Error::Query(QueryError {
            kind: query_error_kind(server.code),
            sql: ctx.sql.clone(),
            sqlstate: Some(server.state.clone()),
            code: Some(server.code),
            message: server.message.clone(),
            detail: ctx.detail.clone(),
            source: Some(Box::new(server)),
        }),
    }
}
