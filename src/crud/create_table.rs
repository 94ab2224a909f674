use super::{CrudTarget, table_ref};
use crate::connector::SqlConnector;
use crate::error::SqlConduitError;
use crate::schema::TableSchema;

/// `CREATE TABLE` text for `schema`.
///
/// Columns without a mappable type are left out. `owner` (else the configured table prefix)
/// is put in front of the table name.
pub(crate) fn create_table_sql(
    connector: &SqlConnector,
    schema: &TableSchema,
    owner: Option<&str>,
) -> Result<String, SqlConduitError> {
    schema.validate()?;
    let types = connector.type_map();

    let mut columns: Vec<String> = Vec::with_capacity(schema.properties.len() + 1);
    for (key, spec) in &schema.properties {
        let Some(internal) = spec.internal_type else {
            continue;
        };
        let Some(native) = types.column_type(internal, spec.max_length, spec.decimal_places) else {
            continue;
        };
        let mut column = format!("{} {native}", connector.enclose(schema.column_name(key)));
        if !spec.nullable {
            column.push_str(" NOT NULL");
        }
        columns.push(column);
    }
    if columns.is_empty() {
        return Err(SqlConduitError::SchemaError(format!(
            "{} has no columns with a known type",
            schema.table_name
        )));
    }

    let key_columns = schema
        .primary_key_columns
        .iter()
        .map(|key| connector.enclose(schema.column_name(key)))
        .collect::<Vec<_>>()
        .join(",");
    columns.push(format!(
        "CONSTRAINT pk_{} PRIMARY KEY ({key_columns})",
        schema.table_name
    ));

    Ok(format!(
        "CREATE TABLE {}({})",
        table_ref(connector, schema, owner),
        columns.join(",")
    ))
}

/// Create the table described by `schema`.
///
/// # Errors
/// Schema validation errors, or the backend's error for the statement.
pub async fn create_table<'a>(
    target: impl Into<CrudTarget<'a>>,
    schema: &TableSchema,
    owner: Option<&str>,
) -> Result<usize, SqlConduitError> {
    let mut target = target.into();
    let sql = create_table_sql(target.connector(), schema, owner)?;
    target.execute(&sql).await
}
