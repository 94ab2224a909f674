use serde_json::Value as JsonValue;

use super::{CrudTarget, PermissionContext, key_literal, table_ref};
use crate::connector::SqlConnector;
use crate::error::SqlConduitError;
use crate::results::ResultSet;
use crate::schema::TableSchema;

pub(crate) fn table_get_sql(
    connector: &SqlConnector,
    key_values: &[JsonValue],
    schema: &TableSchema,
    permission: Option<PermissionContext<'_>>,
) -> Result<String, SqlConduitError> {
    schema.validate()?;
    if key_values.is_empty() {
        return Err(SqlConduitError::KeyParameterMissing(format!(
            "no key values for {}",
            schema.table_name
        )));
    }

    let select = schema
        .properties
        .iter()
        .map(|(key, _)| {
            format!(
                "{} AS {}",
                connector.enclose(schema.column_name(key)),
                connector.enclose(key)
            )
        })
        .collect::<Vec<_>>()
        .join(",");

    let table = table_ref(connector, schema, None);
    let first_key = &schema.primary_key_columns[0];
    let key_column = schema.column_name(first_key);

    let predicate = match (schema.permission_object_type.as_deref(), permission) {
        (Some(object_type), Some(ctx)) => ctx.provider.read_predicate(
            connector,
            ctx.user_id,
            object_type,
            &table,
            key_column,
        ),
        _ => None,
    };

    let keys = key_values
        .iter()
        .map(|value| key_literal(connector, schema, first_key, value))
        .collect::<Vec<_>>()
        .join(",");

    let mut sql = format!("SELECT {select} FROM {table}");
    let mut where_clause = format!("{} IN ({keys})", connector.enclose(key_column));
    if let Some(predicate) = predicate {
        sql.push_str(&predicate.join);
        where_clause = format!("({}) AND {where_clause}", predicate.condition);
    }
    sql.push_str(" WHERE ");
    sql.push_str(&where_clause);

    if let Some(next_key) = schema.primary_key_columns.get(key_values.len()) {
        sql.push_str(" ORDER BY ");
        sql.push_str(&connector.enclose(schema.column_name(next_key)));
    }
    Ok(sql)
}

/// Rows whose first primary key column matches one of `key_values`.
///
/// With fewer key values than primary key columns the rows come back ordered by the first
/// column without a value. When the schema declares a permission object type and a context
/// is given, the collaborator's read predicate is joined in.
///
/// # Errors
/// `KeyParameterMissing` for an empty key list, schema validation errors, or the backend's
/// error.
pub async fn table_get<'a>(
    target: impl Into<CrudTarget<'a>>,
    key_values: &[JsonValue],
    schema: &TableSchema,
    permission: Option<PermissionContext<'_>>,
) -> Result<ResultSet, SqlConduitError> {
    let mut target = target.into();
    let sql = table_get_sql(target.connector(), key_values, schema, permission)?;
    target.query(&sql).await
}
