// Schema-driven statement generation
//
// - create_table / create_tables: DDL from table schemas, one file or a directory of them
// - table_get: keyed SELECT with optional read-permission join
// - records_insert / table_put: sequential INSERT loop, delete-then-insert replace
// - record_update: single-row UPDATE keyed by the first primary key column
// - count_rows: SELECT COUNT(*) for one key value
//
// Every generator runs against a `CrudTarget`, either the connector's ambient pool or an open
// transaction, so a caller that needs atomicity wraps the call in `trans_begin`/`trans_commit`.

mod count_rows;
mod create_table;
mod create_tables;
mod record_update;
mod records_insert;
mod table_get;
mod table_put;

pub use count_rows::count_rows;
pub use create_table::create_table;
pub use create_tables::{create_tables, create_tables_from_dir};
pub use record_update::record_update;
pub use records_insert::records_insert;
pub use table_get::table_get;
pub use table_put::table_put;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::connector::SqlConnector;
use crate::error::SqlConduitError;
use crate::results::ResultSet;
use crate::schema::{ColumnSpec, TableSchema};
use crate::sanitize::NULL;
use crate::transaction::TransactionHandle;
use crate::type_map::InternalType;
use crate::types::RowValues;

/// Where generated statements run.
#[derive(Debug)]
pub enum CrudTarget<'a> {
    /// The connector's pool; every statement may use a different connection.
    Ambient(&'a SqlConnector),
    /// One open transaction of the connector.
    Transaction(&'a SqlConnector, &'a mut TransactionHandle),
}

impl<'a> From<&'a SqlConnector> for CrudTarget<'a> {
    fn from(connector: &'a SqlConnector) -> Self {
        CrudTarget::Ambient(connector)
    }
}

impl<'a> From<(&'a SqlConnector, &'a mut TransactionHandle)> for CrudTarget<'a> {
    fn from((connector, handle): (&'a SqlConnector, &'a mut TransactionHandle)) -> Self {
        CrudTarget::Transaction(connector, handle)
    }
}

impl CrudTarget<'_> {
    #[must_use]
    pub fn connector(&self) -> &SqlConnector {
        match self {
            CrudTarget::Ambient(connector) | CrudTarget::Transaction(connector, _) => connector,
        }
    }

    pub(crate) async fn execute(&mut self, sql: &str) -> Result<usize, SqlConduitError> {
        match self {
            CrudTarget::Ambient(connector) => connector.try_execute(sql, None).await,
            CrudTarget::Transaction(connector, handle) => {
                connector.trans_execute(handle, sql, None).await
            }
        }
    }

    pub(crate) async fn query(&mut self, sql: &str) -> Result<ResultSet, SqlConduitError> {
        match self {
            CrudTarget::Ambient(connector) => connector.try_query(sql, None).await,
            CrudTarget::Transaction(connector, handle) => {
                connector.trans_query(handle, sql, None).await
            }
        }
    }
}

/// SQL fragment contributed by the permission collaborator to a keyed read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPredicate {
    /// Join clause appended after the table name, e.g. ` INNER JOIN metatable ON ...`.
    pub join: String,
    /// Condition ANDed in front of the key filter.
    pub condition: String,
}

/// Access-control collaborator consulted for schemas that declare a permission object type.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Whether `user_id` may write the object `key` of `object_type`.
    async fn has_write_permission(
        &self,
        connector: &SqlConnector,
        user_id: &str,
        object_type: &str,
        key: &JsonValue,
    ) -> Result<bool, SqlConduitError>;

    /// Read filter for `table`, whose primary key column is `key_column`.
    ///
    /// `None` reads without a permission filter.
    fn read_predicate(
        &self,
        connector: &SqlConnector,
        user_id: &str,
        object_type: &str,
        table: &str,
        key_column: &str,
    ) -> Option<ReadPredicate>;
}

/// Acting user plus the collaborator that decides for them.
#[derive(Clone, Copy)]
pub struct PermissionContext<'a> {
    pub user_id: &'a str,
    pub provider: &'a dyn PermissionProvider,
}

impl std::fmt::Debug for PermissionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionContext")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Deny unless the collaborator grants the write. Schemas without a permission object type
/// (or calls without a context) are not checked.
pub(crate) async fn check_write(
    connector: &SqlConnector,
    schema: &TableSchema,
    permission: Option<PermissionContext<'_>>,
    key: &JsonValue,
) -> Result<(), SqlConduitError> {
    let (Some(object_type), Some(ctx)) = (schema.permission_object_type.as_deref(), permission)
    else {
        return Ok(());
    };
    let granted = ctx
        .provider
        .has_write_permission(connector, ctx.user_id, object_type, key)
        .await?;
    if granted {
        Ok(())
    } else {
        tracing::warn!(
            db = %connector.label(),
            backend = %connector.kind(),
            user = ctx.user_id,
            object_type,
            "write permission denied"
        );
        Err(SqlConduitError::PermissionDenied(format!(
            "{} may not write {object_type} {key}",
            ctx.user_id
        )))
    }
}

/// Table name with the configured prefix (or an explicit owner) in front.
pub(crate) fn table_ref(connector: &SqlConnector, schema: &TableSchema, owner: Option<&str>) -> String {
    let prefix = owner.or_else(|| connector.table_prefix()).unwrap_or_default();
    format!("{prefix}{}", schema.table_name)
}

/// Literal for one column, `NULL` when the column declares no type.
pub(crate) fn column_literal(connector: &SqlConnector, spec: &ColumnSpec, value: &JsonValue) -> String {
    match spec.internal_type {
        Some(internal) if internal != InternalType::Unknown => {
            connector
                .sanitizer()
                .sanitize_json(value, internal, spec.decimal_places)
        }
        _ => NULL.to_string(),
    }
}

/// Literal for a key value in the first primary key column's type.
pub(crate) fn key_literal(
    connector: &SqlConnector,
    schema: &TableSchema,
    key_column: &str,
    value: &JsonValue,
) -> String {
    match schema.column(key_column) {
        Some(spec) => column_literal(connector, spec, value),
        None => connector.sanitizer().sql_string(&RowValues::from(value), false),
    }
}

pub(crate) fn is_absent(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::ConnectionConfig;
    use crate::connector::SqlConnector;
    use crate::schema::{ColumnSpec, TableSchema};
    use crate::type_map::InternalType;

    /// Closed connector: enough for statement text, nothing gets executed.
    pub(crate) fn sqlite_connector(no_brackets: bool) -> SqlConnector {
        SqlConnector::new(
            ConnectionConfig::sqlite("unused.db")
                .builder()
                .no_brackets(no_brackets)
                .finish(),
        )
    }

    pub(crate) fn mssql_connector() -> SqlConnector {
        SqlConnector::new(ConnectionConfig::mssql("h", 1433, "d", "u", "p"))
    }

    pub(crate) fn drinks() -> TableSchema {
        TableSchema::new("drinks", &["drinkid"])
            .property(
                "drinkid",
                ColumnSpec::new(InternalType::Varchar)
                    .column_name("drinkid")
                    .max_length(255),
            )
            .property(
                "price",
                ColumnSpec::new(InternalType::Float64).column_name("price"),
            )
    }

    pub(crate) fn order_lines() -> TableSchema {
        TableSchema::new("orderlines", &["orderid", "lineno"])
            .property("orderid", ColumnSpec::new(InternalType::Int32).not_null())
            .property("lineno", ColumnSpec::new(InternalType::Int16).not_null())
            .property(
                "qty",
                ColumnSpec::new(InternalType::Decimal).decimal_places(2),
            )
            .property("note", ColumnSpec::new(InternalType::Text).column_name("memo"))
    }
}
