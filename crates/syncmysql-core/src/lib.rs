//! Core types for syncmysql.
//!
//! This crate holds the driver-independent pieces shared by the async
//! driver layer and the blocking facade:
//!
//! - [`Value`] for parameters and decoded cells
//! - [`Row`] and [`ColumnInfo`] for result rows
//! - [`Error`] and its payload structs
//! - calendar helpers for the `Date` / `Time` / `Timestamp` encodings
//! - MySQL identifier quoting

pub mod error;
pub mod identifiers;
pub mod row;
pub mod temporal;
pub mod value;

pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, PoolError, PoolErrorKind,
    ProtocolError, QueryError, QueryErrorKind, Result, TypeError,
};
pub use identifiers::{quote_ident_mysql, quote_qualified_mysql};
pub use row::{ColumnInfo, FromValue, Row};
pub use value::Value;
