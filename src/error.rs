use thiserror::Error;

#[cfg(any(feature = "postgres", feature = "mssql"))]
use bb8;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "mysql")]
use sqlx;
#[cfg(feature = "mssql")]
use tiberius;
#[cfg(feature = "postgres")]
use tokio_postgres;

/// Numeric code returned by [`SqlConduitError::code`] for a denied write.
pub const NO_PERMISSION: i64 = -1;
/// Numeric code for a failed insert.
pub const INSERT_FAILED: i64 = -2;
/// Numeric code for a failed update.
pub const UPDATE_FAILED: i64 = -3;
/// Numeric code for a failed delete.
pub const DELETE_FAILED: i64 = -4;
/// Numeric code for an insert payload that was not a sequence of records.
pub const ARRAY_EXPECTED: i64 = -5;
/// Numeric code for a missing key value or key column.
pub const KEY_PARAMETER_MISSING: i64 = -6;
/// Numeric code for everything else.
pub const UNKNOWN: i64 = -99;

#[derive(Debug, Error)]
pub enum SqlConduitError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[cfg(feature = "mysql")]
    #[error(transparent)]
    MysqlError(#[from] sqlx::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PoolErrorPostgres(#[from] bb8::RunError<tokio_postgres::Error>),

    #[cfg(feature = "mssql")]
    #[error(transparent)]
    PoolErrorMssql(#[from] bb8::RunError<tiberius::error::Error>),

    #[error("Connection configuration is missing")]
    ConfigMissing,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported backend: {0}")]
    Unsupported(String),

    #[error("Backend not open: {0}")]
    BackendUnset(String),

    #[error("Connection error: {0}")]
    ConnectError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("SQL execution error: {0}")]
    ExecuteError(String),

    #[error("Stream setup error: {0}")]
    StreamSetupError(String),

    #[error("Transaction begin error: {0}")]
    TransactionBeginError(String),

    #[error("Transaction statement error: {0}")]
    TransactionActError(String),

    #[error("Transaction commit error: {0}")]
    TransactionCommitError(String),

    #[error("Transaction rollback error: {0}")]
    TransactionRollbackError(String),

    #[error("Transaction handle belongs to another connector: {0}")]
    HandleMismatch(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Key parameter missing: {0}")]
    KeyParameterMissing(String),

    #[error("Schema has no primary key: {0}")]
    SchemaMissingPrimaryKey(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Expected an array of records: {0}")]
    ArrayExpected(String),

    #[error("Insert failed after {inserted} row(s): {message}")]
    InsertFailed { inserted: usize, message: String },

    #[error("Update failed: {0}")]
    UpdateFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SqlConduitError {
    /// Stable negative code for callers that branch on numbers rather than variants.
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            Self::PermissionDenied(_) => NO_PERMISSION,
            Self::InsertFailed { .. } => INSERT_FAILED,
            Self::UpdateFailed(_) => UPDATE_FAILED,
            Self::DeleteFailed(_) => DELETE_FAILED,
            Self::ArrayExpected(_) => ARRAY_EXPECTED,
            Self::KeyParameterMissing(_) => KEY_PARAMETER_MISSING,
            _ => UNKNOWN,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<bb8::RunError<SqlConduitError>> for SqlConduitError {
    fn from(err: bb8::RunError<SqlConduitError>) -> Self {
        match err {
            bb8::RunError::User(inner) => inner,
            bb8::RunError::TimedOut => {
                SqlConduitError::ConnectError("SQLite pool checkout timed out".to_string())
            }
        }
    }
}
