//! Convenient imports for common functionality.
//!
//! This module re-exports the types and generators most callers need.

pub use crate::backend::PoolStatus;
pub use crate::config::{ConnectionConfig, ConnectionConfigBuilder, ConnectionParams};
pub use crate::connector::SqlConnector;
pub use crate::crud::{
    CrudTarget, PermissionContext, PermissionProvider, ReadPredicate, count_rows, create_table,
    create_tables, create_tables_from_dir, record_update, records_insert, table_get, table_put,
};
pub use crate::error::SqlConduitError;
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::sanitize::Sanitizer;
pub use crate::schema::{ColumnSpec, TableSchema};
pub use crate::stream::{PREFETCH_WINDOW, QueryStream, StreamChunk};
pub use crate::transaction::{TransactionHandle, TransactionState};
pub use crate::type_map::{InternalType, TypeMap};
pub use crate::types::{BackendKind, ConnectorState, RowValues};
