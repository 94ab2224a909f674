//! One async interface over `PostgreSQL`, SQL Server, `MySQL` and `SQLite`.
//!
//! A [`SqlConnector`] owns one backend pool and exposes plain queries, bounded row streams and
//! caller-owned transactions. The [`crud`] module turns a declarative [`TableSchema`] into
//! `CREATE TABLE`, `SELECT`, `INSERT`, `UPDATE` and delete-then-insert statements with the
//! backend's quoting and column types.
//!
//! ```rust,no_run
//! use sql_conduit::prelude::*;
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), SqlConduitError> {
//! let mut db = SqlConnector::new(ConnectionConfig::sqlite("shop.db"));
//! db.try_open().await?;
//!
//! let drinks = TableSchema::from_json_str(
//!     r#"{"tableName": "drinks", "primaryKeyColumns": ["drinkid"],
//!         "properties": {"drinkid": {"internalType": "varchar", "maxLength": 16},
//!                        "price": {"internalType": "float64"}}}"#,
//! )?;
//! create_table(&db, &drinks, None).await?;
//!
//! let mut tx = db.trans_begin(None).await?;
//! let rows = json!([{"drinkid": "D01", "price": 1.99}]);
//! records_insert((&db, &mut tx), &rows, &drinks, None, None).await?;
//! db.try_trans_commit(tx, None).await?;
//!
//! let rows = table_get(&db, &[json!("D01")], &drinks, None).await?;
//! assert_eq!(rows.len(), 1);
//! db.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connector;
pub mod crud;
pub mod error;
pub mod prelude;
pub mod results;
pub mod sanitize;
pub mod schema;
pub mod stream;
pub mod transaction;
pub mod type_map;
pub mod types;

mod backend;

#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use backend::PoolStatus;
pub use config::{ConnectionConfig, ConnectionConfigBuilder, ConnectionParams};
pub use connector::SqlConnector;
pub use error::SqlConduitError;
pub use results::{CustomDbRow, ResultSet};
pub use sanitize::Sanitizer;
pub use schema::{ColumnSpec, TableSchema};
pub use stream::{PREFETCH_WINDOW, QueryStream, StreamChunk};
pub use transaction::{TransactionHandle, TransactionState};
pub use type_map::{InternalType, TypeMap};
pub use types::{BackendKind, ConnectorState, Enclosure, RowValues};
