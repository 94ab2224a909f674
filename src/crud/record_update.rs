use serde_json::Value as JsonValue;

use super::{CrudTarget, PermissionContext, check_write, column_literal, is_absent, key_literal, table_ref};
use crate::connector::SqlConnector;
use crate::error::SqlConduitError;
use crate::schema::TableSchema;

pub(crate) fn record_update_sql(
    connector: &SqlConnector,
    row: &JsonValue,
    schema: &TableSchema,
    key_value: &JsonValue,
) -> Result<String, SqlConduitError> {
    schema.validate()?;
    let key = &schema.primary_key_columns[0];
    if is_absent(key_value) || row.get(key).is_none_or(is_absent) {
        return Err(SqlConduitError::KeyParameterMissing(format!(
            "{} update needs a value for {key}",
            schema.table_name
        )));
    }

    // every property present in the row, whatever its value; never the key
    let assignments = schema
        .properties
        .iter()
        .filter(|(name, spec)| name != key && spec.internal_type.is_some())
        .filter_map(|(name, spec)| {
            row.get(name).map(|value| {
                format!(
                    "{}={}",
                    connector.enclose(schema.column_name(name)),
                    column_literal(connector, spec, value)
                )
            })
        })
        .collect::<Vec<_>>();
    if assignments.is_empty() {
        return Err(SqlConduitError::UpdateFailed(format!(
            "no columns to update in {}",
            schema.table_name
        )));
    }

    Ok(format!(
        "UPDATE {} SET {} WHERE {}={}",
        table_ref(connector, schema, None),
        assignments.join(","),
        connector.enclose(schema.column_name(key)),
        key_literal(connector, schema, key, key_value)
    ))
}

/// Update the record whose first primary key column equals `key_value`.
///
/// Every schema property present in `row` is written, including `0`, `false` and `""`. The
/// primary key column is never part of `SET`, even when the row carries it.
///
/// # Errors
/// `KeyParameterMissing` when `key_value` or the row's key is absent, `PermissionDenied`,
/// `UpdateFailed` for an empty `SET` list or a failed statement.
pub async fn record_update<'a>(
    target: impl Into<CrudTarget<'a>>,
    row: &JsonValue,
    schema: &TableSchema,
    key_value: &JsonValue,
    permission: Option<PermissionContext<'_>>,
) -> Result<usize, SqlConduitError> {
    let mut target = target.into();
    let sql = record_update_sql(target.connector(), row, schema, key_value)?;
    check_write(target.connector(), schema, permission, key_value).await?;
    target
        .execute(&sql)
        .await
        .map_err(|e| SqlConduitError::UpdateFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::crud::test_support::{drinks, mssql_connector, order_lines, sqlite_connector};

    #[test]
    fn key_column_never_in_set() {
        let db = sqlite_connector(true);
        let sql = record_update_sql(
            &db,
            &json!({"drinkid": "D01", "price": 2.25}),
            &drinks(),
            &json!("D01"),
        )
        .unwrap();
        assert_eq!(sql, "UPDATE drinks SET price=2.25 WHERE drinkid='D01'");
    }

    #[test]
    fn zero_false_and_empty_are_written() {
        let db = mssql_connector();
        let sql = record_update_sql(
            &db,
            &json!({"orderid": 7, "qty": 0, "note": ""}),
            &order_lines(),
            &json!(7),
        )
        .unwrap();
        assert_eq!(
            sql,
            "UPDATE orderlines SET [qty]=0.00,[memo]=N'' WHERE [orderid]=7"
        );
    }

    #[test]
    fn missing_key_is_reported() {
        let db = sqlite_connector(false);
        let err = record_update_sql(&db, &json!({"price": 1}), &drinks(), &json!("D01"))
            .unwrap_err();
        assert_eq!(err.code(), crate::error::KEY_PARAMETER_MISSING);
        let err = record_update_sql(&db, &json!({"drinkid": "D01"}), &drinks(), &JsonValue::Null)
            .unwrap_err();
        assert_eq!(err.code(), crate::error::KEY_PARAMETER_MISSING);
    }

    #[test]
    fn nothing_to_set_is_update_failed() {
        let db = sqlite_connector(false);
        let err = record_update_sql(&db, &json!({"drinkid": "D01"}), &drinks(), &json!("D01"))
            .unwrap_err();
        assert_eq!(err.code(), crate::error::UPDATE_FAILED);
    }
}
