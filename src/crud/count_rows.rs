use super::CrudTarget;
use crate::connector::SqlConnector;
use crate::types::RowValues;

/// `SELECT COUNT(*)` text, `None` when a numeric key is not a number.
pub(crate) fn count_rows_sql(
    connector: &SqlConnector,
    table: &str,
    key_column: &str,
    key_value: &RowValues,
    key_is_numeric: bool,
) -> Option<String> {
    let sanitizer = connector.sanitizer();
    let condition = match key_value {
        RowValues::Text(text) if key_is_numeric => {
            let parsed = text.trim().parse::<f64>().ok().filter(|f| !f.is_nan())?;
            sanitizer.sql_double(&RowValues::Float(parsed))
        }
        RowValues::Text(_) => sanitizer.sql_string(key_value, false),
        RowValues::Float(f) if f.is_nan() => return None,
        other => sanitizer.sql_double(other),
    };
    Some(format!(
        "SELECT COUNT(*) FROM {} WHERE {}={condition}",
        connector.enclose(table),
        connector.enclose(key_column)
    ))
}

/// Number of rows of `table` whose `key_column` equals `key_value`; `-1` on any failure.
///
/// Text keys are quoted unless `key_is_numeric` is set, in which case they must parse as a
/// number. Non-text keys are always compared as numbers.
pub async fn count_rows<'a>(
    target: impl Into<CrudTarget<'a>>,
    table: &str,
    key_column: &str,
    key_value: &RowValues,
    key_is_numeric: bool,
) -> i64 {
    let mut target = target.into();
    let Some(sql) = count_rows_sql(target.connector(), table, key_column, key_value, key_is_numeric)
    else {
        return -1;
    };
    match target.query(&sql).await {
        Ok(rows) => rows
            .results
            .first()
            .and_then(|row| row.get_by_index(0))
            .and_then(|value| match value {
                RowValues::Int(n) => Some(*n),
                #[allow(clippy::cast_possible_truncation)]
                RowValues::Float(f) => Some(*f as i64),
                RowValues::Text(t) => t.parse().ok(),
                _ => None,
            })
            .unwrap_or(-1),
        Err(err) => {
            tracing::error!(
                db = %target.connector().label(),
                backend = %target.connector().kind(),
                error = %err,
                "count rows failed"
            );
            -1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crud::test_support::sqlite_connector;

    #[test]
    fn text_and_numeric_keys() {
        let db = sqlite_connector(true);
        assert_eq!(
            count_rows_sql(&db, "drinks", "drinkid", &RowValues::Text("D'1".into()), false)
                .as_deref(),
            Some("SELECT COUNT(*) FROM drinks WHERE drinkid='D''1'")
        );
        assert_eq!(
            count_rows_sql(&db, "orders", "id", &RowValues::Text(" 42 ".into()), true).as_deref(),
            Some("SELECT COUNT(*) FROM orders WHERE id=42")
        );
        assert_eq!(
            count_rows_sql(&db, "orders", "id", &RowValues::Int(9), false).as_deref(),
            Some("SELECT COUNT(*) FROM orders WHERE id=9")
        );
    }

    #[test]
    fn non_numeric_key_is_rejected() {
        let db = sqlite_connector(true);
        assert!(count_rows_sql(&db, "orders", "id", &RowValues::Text("abc".into()), true).is_none());
        assert!(count_rows_sql(&db, "orders", "id", &RowValues::Float(f64::NAN), false).is_none());
    }
}
