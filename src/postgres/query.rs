use std::error::Error;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use tokio_postgres::types::{FromSql, Type};

use crate::error::SqlConduitError;
use crate::results::{ResultSet, RowShape, column_names};
use crate::types::RowValues;

/// `numeric` decoded from the binary wire format into the nearest `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PgNumeric(pub f64);

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        if raw.len() < 8 {
            return Err("numeric header truncated".into());
        }
        let ndigits = usize::from(u16::from_be_bytes([raw[0], raw[1]]));
        let weight = i32::from(i16::from_be_bytes([raw[2], raw[3]]));
        let sign = u16::from_be_bytes([raw[4], raw[5]]);
        match sign {
            NUMERIC_NAN => return Ok(PgNumeric(f64::NAN)),
            NUMERIC_PINF => return Ok(PgNumeric(f64::INFINITY)),
            NUMERIC_NINF => return Ok(PgNumeric(f64::NEG_INFINITY)),
            _ => {}
        }
        if raw.len() < 8 + ndigits * 2 {
            return Err("numeric digits truncated".into());
        }
        if ndigits == 0 {
            return Ok(PgNumeric(0.0));
        }

        // base-10000 digits d0 d1 .. read as 0.d0d1.. * 10^(4 * (weight + 1))
        let mut text = String::with_capacity(ndigits * 4 + 12);
        if sign == NUMERIC_NEG {
            text.push('-');
        }
        text.push_str("0.");
        for chunk in raw[8..8 + ndigits * 2].chunks_exact(2) {
            let digit = u16::from_be_bytes([chunk[0], chunk[1]]);
            text.push_str(&format!("{digit:04}"));
        }
        text.push_str(&format!("e{}", 4 * (weight + 1)));
        Ok(PgNumeric(text.parse::<f64>()?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
pub(crate) fn extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<RowValues, SqlConduitError> {
    let type_info = row.columns()[idx].type_();

    Ok(match type_info.name() {
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        "int8" => row
            .try_get::<_, Option<i64>>(idx)?
            .map_or(RowValues::Null, RowValues::Int),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Float(f64::from(v))),
        "float8" => row
            .try_get::<_, Option<f64>>(idx)?
            .map_or(RowValues::Null, RowValues::Float),
        "numeric" => row
            .try_get::<_, Option<PgNumeric>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Float(v.0)),
        "bool" => row
            .try_get::<_, Option<bool>>(idx)?
            .map_or(RowValues::Null, RowValues::Bool),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map_or(RowValues::Null, RowValues::Timestamp),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Timestamp(v.naive_utc())),
        "date" => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map_or(RowValues::Null, |v| {
                RowValues::Timestamp(v.and_time(NaiveTime::MIN))
            }),
        "json" | "jsonb" => row
            .try_get::<_, Option<Value>>(idx)?
            .map_or(RowValues::Null, RowValues::JSON),
        "bytea" => row
            .try_get::<_, Option<Vec<u8>>>(idx)?
            .map_or(RowValues::Null, RowValues::Blob),
        // text, varchar, bpchar, name and anything else with a text form
        _ => row
            .try_get::<_, Option<String>>(idx)?
            .map_or(RowValues::Null, RowValues::Text),
    })
}

pub(crate) fn row_values(
    row: &tokio_postgres::Row,
    width: usize,
) -> Result<Vec<RowValues>, SqlConduitError> {
    (0..width).map(|idx| extract_value(row, idx)).collect()
}

pub(crate) fn columns_shape(columns: &[tokio_postgres::Column], lower_case: bool) -> RowShape {
    RowShape::new(column_names(
        columns.iter().map(|col| col.name().to_string()),
        lower_case,
    ))
}

/// Build a result set from fetched rows; column names come from the first row.
pub(crate) fn build_result_set(
    rows: &[tokio_postgres::Row],
    lower_case: bool,
) -> Result<ResultSet, SqlConduitError> {
    let mut result_set = ResultSet::with_capacity(rows.len());
    let Some(first) = rows.first() else {
        return Ok(result_set);
    };
    let names = column_names(
        first.columns().iter().map(|col| col.name().to_string()),
        lower_case,
    );
    let width = names.len();
    result_set.set_column_names(names);

    for row in rows {
        result_set.add_row_values(row_values(row, width)?);
    }
    Ok(result_set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(ndigits: u16, weight: i16, sign: u16, digits: &[u16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&ndigits.to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&0u16.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    fn decode(raw: &[u8]) -> f64 {
        PgNumeric::from_sql(&Type::NUMERIC, raw).unwrap().0
    }

    #[test]
    fn numeric_binary_decodes() {
        // 1.99 = 1 | 9900
        assert_eq!(decode(&numeric(2, 0, 0, &[1, 9900])), 1.99);
        // -12345.678 = 1 | 2345 | 6780
        assert_eq!(decode(&numeric(3, 1, NUMERIC_NEG, &[1, 2345, 6780])), -12345.678);
        // 0.0005 = 5 at weight -1
        assert_eq!(decode(&numeric(1, -1, 0, &[5])), 0.0005);
        assert_eq!(decode(&numeric(0, 0, 0, &[])), 0.0);
        assert!(decode(&numeric(0, 0, NUMERIC_NAN, &[])).is_nan());
    }

    #[test]
    fn numeric_rejects_truncated_input() {
        assert!(PgNumeric::from_sql(&Type::NUMERIC, &[0, 2, 0, 0]).is_err());
        assert!(PgNumeric::from_sql(&Type::NUMERIC, &numeric(2, 0, 0, &[1])).is_err());
    }
}
