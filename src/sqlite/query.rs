use rusqlite::Statement;
use rusqlite::types::ValueRef;

use crate::error::SqlConduitError;
use crate::results::{ResultSet, RowShape, column_names};
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// `SQLite` has no boolean or timestamp storage class; such columns come back as
/// integers or text.
pub(crate) fn extract_value(row: &rusqlite::Row, idx: usize) -> Result<RowValues, SqlConduitError> {
    let value = row.get_ref(idx)?;
    Ok(match value {
        ValueRef::Null => RowValues::Null,
        ValueRef::Integer(i) => RowValues::Int(i),
        ValueRef::Real(f) => RowValues::Float(f),
        ValueRef::Text(bytes) => RowValues::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => RowValues::Blob(bytes.to_vec()),
    })
}

pub(crate) fn row_values(row: &rusqlite::Row, width: usize) -> Result<Vec<RowValues>, SqlConduitError> {
    (0..width).map(|idx| extract_value(row, idx)).collect()
}

pub(crate) fn statement_shape(stmt: &Statement<'_>, lower_case: bool) -> RowShape {
    RowShape::new(column_names(
        stmt.column_names().into_iter().map(str::to_string),
        lower_case,
    ))
}

/// Run a prepared statement and collect every row.
///
/// Statements without result columns (DML) still run; their result set is empty and
/// `rows_affected` carries the change count.
pub(crate) fn build_result_set(
    stmt: &mut Statement<'_>,
    lower_case: bool,
) -> Result<ResultSet, SqlConduitError> {
    if stmt.column_count() == 0 {
        let mut result_set = ResultSet::default();
        result_set.rows_affected = stmt.execute([])?;
        return Ok(result_set);
    }

    let names = column_names(
        stmt.column_names().into_iter().map(str::to_string),
        lower_case,
    );
    let width = names.len();
    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(names);

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        result_set.add_row_values(row_values(row, width)?);
    }
    Ok(result_set)
}

/// Run one statement and report the rows it changed.
///
/// A statement that yields rows is drained so it runs to completion.
pub(crate) fn run_statement(conn: &rusqlite::Connection, sql: &str) -> Result<usize, SqlConduitError> {
    let mut stmt = conn.prepare(sql)?;
    if stmt.column_count() == 0 {
        return Ok(stmt.execute([])?);
    }
    let mut rows = stmt.query([])?;
    while rows.next()?.is_some() {}
    drop(rows);
    Ok(usize::try_from(conn.changes()).unwrap_or(usize::MAX))
}
