//! Result sets and their collection from a `mysql_async` query.

use std::ops::Deref;
use std::sync::Arc;

use mysql_async::prelude::Queryable;
use syncmysql_core::{ColumnInfo, Result, Row};

use crate::error::{ErrorContext, map_statement_error};
use crate::types::{ColumnKind, TypeCastOptions, cell_bytes, decode_text_value};

/// The rows of one result set plus the server's OK-packet summary.
///
/// Dereferences to `[Row]`, so `set.len()`, `set.iter()` and `set[0]`
/// work directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Arc<ColumnInfo>,
    rows: Vec<Row>,
    affected_rows: u64,
    last_insert_id: Option<u64>,
    warnings: u16,
    info: String,
}

impl ResultSet {
    /// A result set holding rows only.
    pub fn from_rows(columns: Arc<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            ..Self::default()
        }
    }

    /// A row-less result set as produced by INSERT / UPDATE / DELETE.
    pub fn from_status(
        affected_rows: u64,
        last_insert_id: Option<u64>,
        warnings: u16,
        info: impl Into<String>,
    ) -> Self {
        Self {
            affected_rows,
            last_insert_id,
            warnings,
            info: info.into(),
            ..Self::default()
        }
    }

    pub fn columns(&self) -> &ColumnInfo {
        &self.columns
    }

    /// True when the statement produced a column list (a SELECT-like result).
    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub fn last_insert_id(&self) -> Option<u64> {
        self.last_insert_id
    }

    pub fn warnings(&self) -> u16 {
        self.warnings
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    /// All rows as a JSON array of objects.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.rows.iter().map(Row::to_json).collect())
    }
}

impl Deref for ResultSet {
    type Target = [Row];

    fn deref(&self) -> &[Row] {
        &self.rows
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

fn decode_row(
    row: mysql_async::Row,
    columns: &Arc<ColumnInfo>,
    kinds: &[ColumnKind],
    opts: &TypeCastOptions,
) -> Row {
    let values = row
        .unwrap()
        .into_iter()
        .zip(kinds)
        .map(|(cell, kind)| decode_text_value(*kind, cell_bytes(cell).as_deref(), opts))
        .collect();
    Row::with_columns(Arc::clone(columns), values)
}

/// Run a text-protocol query and collect every result set it produces.
///
/// The server summary of a row-less statement is read before moving on,
/// since advancing to the next result set replaces it.
pub async fn run_query<Q>(
    conn: &mut Q,
    sql: &str,
    opts: &TypeCastOptions,
    ctx: &ErrorContext,
) -> Result<Vec<ResultSet>>
where
    Q: Queryable,
{
    let mut result = conn
        .query_iter(sql)
        .await
        .map_err(|e| map_statement_error(e, ctx))?;

    let mut sets = Vec::new();
    while let Some(columns) = result.columns() {
        if columns.is_empty() {
            let status = ResultSet::from_status(
                result.affected_rows(),
                result.last_insert_id(),
                result.warnings(),
                result.info().into_owned(),
            );
            // Advances past the OK packet.
            let _: Vec<mysql_async::Row> = result
                .collect()
                .await
                .map_err(|e| map_statement_error(e, ctx))?;
            sets.push(status);
            continue;
        }

        let info = Arc::new(ColumnInfo::new(
            columns.iter().map(|c| c.name_str().into_owned()).collect(),
        ));
        let kinds: Vec<ColumnKind> = columns.iter().map(ColumnKind::from_column).collect();
        let raw: Vec<mysql_async::Row> = result
            .collect()
            .await
            .map_err(|e| map_statement_error(e, ctx))?;
        let rows = raw
            .into_iter()
            .map(|row| decode_row(row, &info, &kinds, opts))
            .collect();
        sets.push(ResultSet::from_rows(info, rows));
    }

    // `columns()` reports a failed later result set as "no more sets"; the
    // error is still pending on the session and only `collect` hands it out.
    let _: Vec<mysql_async::Row> = result
        .collect()
        .await
        .map_err(|e| map_statement_error(e, ctx))?;

    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncmysql_core::Value;

    fn sample() -> ResultSet {
        let columns = Arc::new(ColumnInfo::new(vec!["id".to_string(), "name".to_string()]));
        let rows = vec![
            Row::with_columns(Arc::clone(&columns), vec![Value::Int(1), Value::from("a")]),
            Row::with_columns(Arc::clone(&columns), vec![Value::Int(2), Value::from("b")]),
        ];
        ResultSet::from_rows(columns, rows)
    }

    #[test]
    fn derefs_to_rows() {
        let set = sample();
        assert_eq!(set.len(), 2);
        assert!(set.has_columns());
        assert_eq!(set[1].get_named::<String>("name").unwrap(), "b");
        let ids: Vec<i32> = set.iter().map(|r| r.get_as(0).unwrap()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn status_sets_have_no_rows() {
        let status = ResultSet::from_status(3, Some(17), 1, "Rows matched: 3");
        assert!(status.is_empty());
        assert!(!status.has_columns());
        assert_eq!(status.affected_rows(), 3);
        assert_eq!(status.last_insert_id(), Some(17));
        assert_eq!(status.warnings(), 1);
        assert_eq!(status.info(), "Rows matched: 3");
    }

    #[test]
    fn json_array() {
        assert_eq!(
            sample().to_json(),
            serde_json::json!([{"id": 1, "name": "a"}, {"id": 2, "name": "b"}])
        );
    }
}
