use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::TryStreamExt;
use tiberius::numeric::Numeric;
use tiberius::{ColumnData, FromSql};

use super::config::MssqlClient;
use crate::error::SqlConduitError;
use crate::results::{ResultSet, RowShape, column_names};
use crate::types::RowValues;

/// Exact decimal text of `value * 10^-scale` parsed to the nearest `f64`.
fn numeric_to_f64(n: Numeric) -> f64 {
    format!("{}e-{}", n.value(), n.scale())
        .parse()
        .unwrap_or(f64::NAN)
}

/// Convert one SQL Server cell into a `RowValues`.
pub(crate) fn extract_value(data: &ColumnData<'static>) -> Result<RowValues, SqlConduitError> {
    let value = match data {
        ColumnData::U8(v) => v.map(|x| RowValues::Int(i64::from(x))),
        ColumnData::I16(v) => v.map(|x| RowValues::Int(i64::from(x))),
        ColumnData::I32(v) => v.map(|x| RowValues::Int(i64::from(x))),
        ColumnData::I64(v) => v.map(RowValues::Int),
        ColumnData::F32(v) => v.map(|x| RowValues::Float(f64::from(x))),
        ColumnData::F64(v) => v.map(RowValues::Float),
        ColumnData::Bit(v) => v.map(RowValues::Bool),
        ColumnData::String(v) => v.as_ref().map(|s| RowValues::Text(s.to_string())),
        ColumnData::Guid(v) => v.map(|g| RowValues::Text(g.to_string())),
        ColumnData::Binary(v) => v.as_ref().map(|b| RowValues::Blob(b.to_vec())),
        ColumnData::Numeric(v) => v.map(|n| RowValues::Float(numeric_to_f64(n))),
        ColumnData::Xml(v) => v.as_ref().map(|x| RowValues::Text(x.to_string())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)?.map(RowValues::Timestamp)
        }
        ColumnData::Date(_) => {
            NaiveDate::from_sql(data)?.map(|d| RowValues::Timestamp(d.and_time(NaiveTime::MIN)))
        }
        ColumnData::DateTimeOffset(_) => {
            DateTime::<Utc>::from_sql(data)?.map(|d| RowValues::Timestamp(d.naive_utc()))
        }
        ColumnData::Time(_) => NaiveTime::from_sql(data)?
            .map(|t| RowValues::Text(t.format("%H:%M:%S%.f").to_string())),
        #[allow(unreachable_patterns)]
        _ => None,
    };
    Ok(value.unwrap_or(RowValues::Null))
}

pub(crate) fn row_values(row: &tiberius::Row) -> Result<Vec<RowValues>, SqlConduitError> {
    row.cells().map(|(_, data)| extract_value(data)).collect()
}

pub(crate) fn columns_shape(columns: &[tiberius::Column], lower_case: bool) -> RowShape {
    RowShape::new(column_names(
        columns.iter().map(|col| col.name().to_string()),
        lower_case,
    ))
}

/// Run a batch and collect its rows; column names come from the first result.
pub(crate) async fn build_result_set(
    client: &mut MssqlClient,
    sql: &str,
    lower_case: bool,
) -> Result<ResultSet, SqlConduitError> {
    let mut stream = client.simple_query(sql).await?;
    let names = stream
        .columns()
        .await?
        .map(|cols| {
            column_names(cols.iter().map(|col| col.name().to_string()), lower_case)
        });

    let mut result_set = ResultSet::with_capacity(10);
    if let Some(names) = names {
        result_set.set_column_names(names);
    }

    let mut rows = stream.into_row_stream();
    while let Some(row) = rows.try_next().await? {
        result_set.add_row_values(row_values(&row)?);
    }
    Ok(result_set)
}
