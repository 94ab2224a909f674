use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::error::SqlConduitError;
use crate::results::{ResultSet, RowShape, column_names};
use crate::types::RowValues;

/// Extract a `RowValues` from a `MySQL` row, dispatching on the reported column type.
///
/// `DECIMAL` and `JSON` arrive as text and are parsed here.
pub(crate) fn extract_value(row: &MySqlRow, idx: usize) -> Result<RowValues, SqlConduitError> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(RowValues::Null);
    }
    let type_name = row.columns()[idx].type_info().name();

    Ok(match type_name {
        "BOOLEAN" => RowValues::Bool(row.try_get::<bool, _>(idx)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            RowValues::Int(row.try_get_unchecked::<i64, _>(idx)?)
        }
        name if name.ends_with("UNSIGNED") => {
            let value = row.try_get_unchecked::<u64, _>(idx)?;
            #[allow(clippy::cast_precision_loss)]
            let wide = value as f64;
            i64::try_from(value).map_or(RowValues::Float(wide), RowValues::Int)
        }
        "FLOAT" => RowValues::Float(f64::from(row.try_get::<f32, _>(idx)?)),
        "DOUBLE" => RowValues::Float(row.try_get::<f64, _>(idx)?),
        "DECIMAL" => {
            let text = row.try_get_unchecked::<String, _>(idx)?;
            match text.parse::<f64>() {
                Ok(value) => RowValues::Float(value),
                Err(_) => RowValues::Text(text),
            }
        }
        "DATETIME" | "TIMESTAMP" => RowValues::Timestamp(row.try_get::<NaiveDateTime, _>(idx)?),
        "DATE" => RowValues::Timestamp(row.try_get::<NaiveDate, _>(idx)?.and_time(NaiveTime::MIN)),
        "JSON" => {
            let text = row.try_get_unchecked::<String, _>(idx)?;
            match serde_json::from_str(&text) {
                Ok(value) => RowValues::JSON(value),
                Err(_) => RowValues::Text(text),
            }
        }
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => RowValues::Blob(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        // CHAR, VARCHAR, TEXT, ENUM, SET, TIME, YEAR
        _ => RowValues::Text(row.try_get_unchecked::<String, _>(idx)?),
    })
}

pub(crate) fn row_values(row: &MySqlRow) -> Result<Vec<RowValues>, SqlConduitError> {
    (0..row.columns().len())
        .map(|idx| extract_value(row, idx))
        .collect()
}

pub(crate) fn row_shape(row: &MySqlRow, lower_case: bool) -> RowShape {
    RowShape::new(column_names(
        row.columns().iter().map(|col| col.name().to_string()),
        lower_case,
    ))
}

/// Build a result set from fetched rows; column names come from the first row.
pub(crate) fn build_result_set(
    rows: &[MySqlRow],
    lower_case: bool,
) -> Result<ResultSet, SqlConduitError> {
    let mut result_set = ResultSet::with_capacity(rows.len());
    let Some(first) = rows.first() else {
        return Ok(result_set);
    };
    result_set.set_column_names(column_names(
        first.columns().iter().map(|col| col.name().to_string()),
        lower_case,
    ));
    for row in rows {
        result_set.add_row_values(row_values(row)?);
    }
    Ok(result_set)
}
