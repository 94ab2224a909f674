use serde_json::Value as JsonValue;

use super::{CrudTarget, PermissionContext, check_write, column_literal, table_ref};
use crate::connector::SqlConnector;
use crate::error::SqlConduitError;
use crate::schema::TableSchema;

/// `INSERT INTO t(cols) VALUES (` prefix shared by every row of one call.
pub(crate) fn insert_prefix(connector: &SqlConnector, schema: &TableSchema) -> String {
    let columns = schema
        .properties
        .iter()
        .map(|(key, _)| connector.enclose(schema.column_name(key)))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "INSERT INTO {}({columns}) VALUES (",
        table_ref(connector, schema, None)
    )
}

/// Complete statement for one row; properties missing from `row` insert `NULL`.
pub(crate) fn insert_row_sql(
    connector: &SqlConnector,
    schema: &TableSchema,
    prefix: &str,
    row: &JsonValue,
) -> String {
    let values = schema
        .properties
        .iter()
        .map(|(key, spec)| column_literal(connector, spec, row.get(key).unwrap_or(&JsonValue::Null)))
        .collect::<Vec<_>>()
        .join(",");
    format!("{prefix}{values})")
}

pub(crate) fn expect_rows<'r>(
    rows: &'r JsonValue,
    schema: &TableSchema,
) -> Result<&'r [JsonValue], SqlConduitError> {
    match rows {
        JsonValue::Array(items) => Ok(items),
        other => Err(SqlConduitError::ArrayExpected(format!(
            "{} rows must be an array, got {}",
            schema.table_name,
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Insert `rows` one statement at a time, in order.
///
/// Stops at the first failing row; rows already written stay written.
pub(crate) async fn insert_rows(
    target: &mut CrudTarget<'_>,
    rows: &[JsonValue],
    schema: &TableSchema,
) -> Result<usize, SqlConduitError> {
    let prefix = insert_prefix(target.connector(), schema);
    let mut inserted = 0;
    for row in rows {
        let sql = insert_row_sql(target.connector(), schema, &prefix, row);
        match target.execute(&sql).await {
            Ok(affected) => inserted += affected,
            Err(e) => {
                return Err(SqlConduitError::InsertFailed {
                    inserted,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(inserted)
}

/// Insert every record of the JSON array `rows`.
///
/// `key_values` names the parent object the records belong to. When it is given, the write
/// permission is checked once against its first value; detail inserts without a parent key
/// are not checked.
///
/// # Errors
/// `ArrayExpected` when `rows` is not an array, `PermissionDenied`, schema validation errors,
/// or `InsertFailed` carrying the count of rows written before the failure.
pub async fn records_insert<'a>(
    target: impl Into<CrudTarget<'a>>,
    rows: &JsonValue,
    schema: &TableSchema,
    key_values: Option<&[JsonValue]>,
    permission: Option<PermissionContext<'_>>,
) -> Result<usize, SqlConduitError> {
    let mut target = target.into();
    schema.validate()?;
    let rows = expect_rows(rows, schema)?;

    if let Some(key) = key_values.and_then(<[JsonValue]>::first) {
        check_write(target.connector(), schema, permission, key).await?;
    }

    insert_rows(&mut target, rows, schema).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::crud::test_support::{drinks, mssql_connector, order_lines, sqlite_connector};

    #[test]
    fn drinks_row_without_brackets() {
        let db = sqlite_connector(true);
        let schema = drinks();
        let prefix = insert_prefix(&db, &schema);
        assert_eq!(
            insert_row_sql(&db, &schema, &prefix, &json!({"drinkid": "D01", "price": 1.99})),
            "INSERT INTO drinks(drinkid,price) VALUES ('D01',1.99)"
        );
    }

    #[test]
    fn missing_properties_insert_null() {
        let db = mssql_connector();
        let schema = order_lines();
        let prefix = insert_prefix(&db, &schema);
        assert_eq!(
            insert_row_sql(&db, &schema, &prefix, &json!({"orderid": 7, "lineno": 1, "qty": 2.5})),
            "INSERT INTO orderlines([orderid],[lineno],[qty],[memo]) VALUES (7,1,2.50,NULL)"
        );
    }

    #[test]
    fn payload_must_be_an_array() {
        let schema = drinks();
        assert!(matches!(
            expect_rows(&json!({"drinkid": "D01"}), &schema),
            Err(SqlConduitError::ArrayExpected(msg)) if msg.contains("object")
        ));
        assert_eq!(expect_rows(&json!([]), &schema).unwrap().len(), 0);
    }
}
