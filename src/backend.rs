use async_trait::async_trait;

use crate::config::ConnectionParams;
use crate::error::SqlConduitError;
use crate::results::ResultSet;
use crate::stream::QueryStream;
use crate::types::BackendKind;

#[cfg(feature = "mssql")]
use crate::mssql;
#[cfg(feature = "mysql")]
use crate::mysql;
#[cfg(feature = "postgres")]
use crate::postgres;
#[cfg(feature = "sqlite")]
use crate::sqlite;

/// Connection counts of an open backend pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections currently held by the pool, idle or checked out.
    pub connections: u32,
    /// Connections available for checkout.
    pub idle_connections: u32,
}

/// Operations every backend provides in its own native call shape.
#[async_trait]
pub(crate) trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn query(&self, sql: &str) -> Result<ResultSet, SqlConduitError>;

    async fn execute(&self, sql: &str) -> Result<usize, SqlConduitError>;

    /// Set up a native cursor; rows flow once this returns.
    async fn stream(&self, sql: &str, object_mode: bool)
    -> Result<QueryStream, SqlConduitError>;

    /// Check out a dedicated connection and start a transaction on it.
    async fn begin(&self) -> Result<BackendTx, SqlConduitError>;

    fn status(&self) -> PoolStatus;

    async fn close(&self);
}

/// Backend pool owned by an open connector.
pub(crate) enum ConduitPool {
    #[cfg(feature = "postgres")]
    Postgres(postgres::PostgresBackend),
    #[cfg(feature = "mssql")]
    Mssql(mssql::MssqlBackend),
    #[cfg(feature = "mysql")]
    Mysql(mysql::MysqlBackend),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SqliteBackend),
}

impl ConduitPool {
    /// Build the pool for `kind` and prove it with one checkout.
    pub(crate) async fn connect(
        kind: BackendKind,
        params: &ConnectionParams,
        lower_case_names: bool,
    ) -> Result<Self, SqlConduitError> {
        let _ = (params, lower_case_names);
        match kind {
            #[cfg(feature = "postgres")]
            BackendKind::Postgres => Ok(ConduitPool::Postgres(
                postgres::PostgresBackend::connect(params, lower_case_names).await?,
            )),
            #[cfg(feature = "mssql")]
            BackendKind::Mssql => Ok(ConduitPool::Mssql(
                mssql::MssqlBackend::connect(params, lower_case_names).await?,
            )),
            #[cfg(feature = "mysql")]
            BackendKind::Mysql => Ok(ConduitPool::Mysql(
                mysql::MysqlBackend::connect(params, lower_case_names).await?,
            )),
            #[cfg(feature = "sqlite")]
            BackendKind::Sqlite => Ok(ConduitPool::Sqlite(
                sqlite::SqliteBackend::connect(params, lower_case_names).await?,
            )),
            #[allow(unreachable_patterns)]
            other => Err(SqlConduitError::Unsupported(format!(
                "{other} support is not enabled in this build"
            ))),
        }
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        match self {
            #[cfg(feature = "postgres")]
            ConduitPool::Postgres(backend) => backend,
            #[cfg(feature = "mssql")]
            ConduitPool::Mssql(backend) => backend,
            #[cfg(feature = "mysql")]
            ConduitPool::Mysql(backend) => backend,
            #[cfg(feature = "sqlite")]
            ConduitPool::Sqlite(backend) => backend,
        }
    }
}

impl std::fmt::Debug for ConduitPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.backend().status();
        f.debug_struct("ConduitPool")
            .field("kind", &self.backend().kind())
            .field("connections", &status.connections)
            .field("idle_connections", &status.idle_connections)
            .finish()
    }
}

/// Backend-specific transaction state owning its checked-out connection.
pub(crate) enum BackendTx {
    #[cfg(feature = "postgres")]
    Postgres(postgres::transaction::PgTx),
    #[cfg(feature = "mssql")]
    Mssql(mssql::transaction::MssqlTx),
    #[cfg(feature = "mysql")]
    Mysql(mysql::transaction::MysqlTx),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::transaction::SqliteTx),
}

impl BackendTx {
    pub(crate) async fn execute(&mut self, sql: &str) -> Result<usize, SqlConduitError> {
        match self {
            #[cfg(feature = "postgres")]
            BackendTx::Postgres(tx) => tx.execute(sql).await,
            #[cfg(feature = "mssql")]
            BackendTx::Mssql(tx) => tx.execute(sql).await,
            #[cfg(feature = "mysql")]
            BackendTx::Mysql(tx) => tx.execute(sql).await,
            #[cfg(feature = "sqlite")]
            BackendTx::Sqlite(tx) => tx.execute(sql).await,
        }
    }

    pub(crate) async fn query(&mut self, sql: &str) -> Result<ResultSet, SqlConduitError> {
        match self {
            #[cfg(feature = "postgres")]
            BackendTx::Postgres(tx) => tx.query(sql).await,
            #[cfg(feature = "mssql")]
            BackendTx::Mssql(tx) => tx.query(sql).await,
            #[cfg(feature = "mysql")]
            BackendTx::Mysql(tx) => tx.query(sql).await,
            #[cfg(feature = "sqlite")]
            BackendTx::Sqlite(tx) => tx.query(sql).await,
        }
    }

    pub(crate) async fn commit(self) -> Result<(), SqlConduitError> {
        match self {
            #[cfg(feature = "postgres")]
            BackendTx::Postgres(tx) => tx.commit().await,
            #[cfg(feature = "mssql")]
            BackendTx::Mssql(tx) => tx.commit().await,
            #[cfg(feature = "mysql")]
            BackendTx::Mysql(tx) => tx.commit().await,
            #[cfg(feature = "sqlite")]
            BackendTx::Sqlite(tx) => tx.commit().await,
        }
    }

    pub(crate) async fn rollback(self) -> Result<(), SqlConduitError> {
        match self {
            #[cfg(feature = "postgres")]
            BackendTx::Postgres(tx) => tx.rollback().await,
            #[cfg(feature = "mssql")]
            BackendTx::Mssql(tx) => tx.rollback().await,
            #[cfg(feature = "mysql")]
            BackendTx::Mysql(tx) => tx.rollback().await,
            #[cfg(feature = "sqlite")]
            BackendTx::Sqlite(tx) => tx.rollback().await,
        }
    }
}
