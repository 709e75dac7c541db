//! Async MySQL layer for syncmysql.
//!
//! Wraps [`mysql_async`] with the pieces the blocking facade needs:
//!
//! - [`ConnectionConfig`]: builder, URL parsing and validation
//! - statement formatting with `?` / `??` placeholders ([`types::format_query`])
//! - text-protocol value decoding into [`syncmysql_core::Value`]
//! - mapping of driver errors onto [`syncmysql_core::Error`]
//! - [`MySqlSession`], one long-lived session, and [`QueuePool`], the
//!   bounded pool queued work runs on
//!
//! Nothing here blocks; the `syncmysql` crate drives these futures on its
//! own runtime.

pub mod config;
pub mod error;
pub mod logging;
pub mod pool;
pub mod result;
pub mod session;
pub mod types;

pub use config::{
    ConnectionConfig, ConnectionFlags, QueryFormatter, SslMode, SslOptions, TimeZone,
};
pub use error::{ErrorContext, map_connect_error, map_statement_error};
pub use pool::QueuePool;
pub use result::ResultSet;
pub use session::MySqlSession;
pub use types::{TypeCastOptions, call_statement, count_statements, format_query, record_statement};
