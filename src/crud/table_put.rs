use serde_json::Value as JsonValue;

use super::records_insert::{expect_rows, insert_rows};
use super::{CrudTarget, PermissionContext, check_write, key_literal, table_ref};
use crate::connector::SqlConnector;
use crate::error::SqlConduitError;
use crate::schema::TableSchema;

/// `DELETE` matching `key_values` positionally against the primary key columns.
pub(crate) fn table_delete_sql(
    connector: &SqlConnector,
    key_values: &[JsonValue],
    schema: &TableSchema,
) -> Result<String, SqlConduitError> {
    schema.validate()?;
    if key_values.is_empty() {
        return Err(SqlConduitError::KeyParameterMissing(format!(
            "no key values for {}",
            schema.table_name
        )));
    }
    let conditions = schema
        .primary_key_columns
        .iter()
        .zip(key_values)
        .map(|(key, value)| {
            format!(
                "{}={}",
                connector.enclose(schema.column_name(key)),
                key_literal(connector, schema, key, value)
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ");
    Ok(format!(
        "DELETE FROM {} WHERE {conditions}",
        table_ref(connector, schema, None)
    ))
}

/// Replace the detail rows owned by `key_values`: delete them, then insert `rows`.
///
/// The delete and every insert are separate statements; run this on a transaction target
/// for an all-or-nothing replace.
///
/// # Errors
/// `KeyParameterMissing`, `ArrayExpected` (checked before anything is deleted),
/// `PermissionDenied`, `DeleteFailed`, or `InsertFailed` with the rows written so far.
pub async fn table_put<'a>(
    target: impl Into<CrudTarget<'a>>,
    rows: &JsonValue,
    key_values: &[JsonValue],
    schema: &TableSchema,
    permission: Option<PermissionContext<'_>>,
) -> Result<usize, SqlConduitError> {
    let mut target = target.into();
    let delete = table_delete_sql(target.connector(), key_values, schema)?;
    let rows = expect_rows(rows, schema)?;
    check_write(target.connector(), schema, permission, &key_values[0]).await?;

    if let Err(e) = target.execute(&delete).await {
        tracing::error!(
            db = %target.connector().label(),
            table = %schema.table_name,
            sql = %delete,
            "delete before put failed"
        );
        return Err(SqlConduitError::DeleteFailed(e.to_string()));
    }
    insert_rows(&mut target, rows, schema).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::crud::test_support::{mssql_connector, order_lines};

    #[test]
    fn delete_matches_keys_positionally() {
        let db = mssql_connector();
        assert_eq!(
            table_delete_sql(&db, &[json!(7), json!(2)], &order_lines()).unwrap(),
            "DELETE FROM orderlines WHERE [orderid]=7 AND [lineno]=2"
        );
        assert_eq!(
            table_delete_sql(&db, &[json!(7)], &order_lines()).unwrap(),
            "DELETE FROM orderlines WHERE [orderid]=7"
        );
    }

    #[test]
    fn extra_key_values_are_ignored() {
        let db = mssql_connector();
        assert_eq!(
            table_delete_sql(&db, &[json!(7), json!(2), json!(9)], &order_lines()).unwrap(),
            "DELETE FROM orderlines WHERE [orderid]=7 AND [lineno]=2"
        );
    }

    #[test]
    fn no_keys_is_key_parameter_missing() {
        let db = mssql_connector();
        assert!(matches!(
            table_delete_sql(&db, &[], &order_lines()),
            Err(SqlConduitError::KeyParameterMissing(_))
        ));
    }
}
