//! MySQL identifier quoting.

/// Quote a single identifier with backticks, doubling embedded backticks.
///
/// ```
/// use syncmysql_core::quote_ident_mysql;
///
/// assert_eq!(quote_ident_mysql("users"), "`users`");
/// assert_eq!(quote_ident_mysql("user`name"), "`user``name`");
/// ```
#[inline]
pub fn quote_ident_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a possibly qualified name (`schema.table`, `db.proc`), each
/// dot-separated part on its own.
///
/// ```
/// use syncmysql_core::quote_qualified_mysql;
///
/// assert_eq!(quote_qualified_mysql("shop.orders"), "`shop`.`orders`");
/// ```
pub fn quote_qualified_mysql(name: &str) -> String {
    name.split('.')
        .map(quote_ident_mysql)
        .collect::<Vec<_>>()
        .join(".")
}
