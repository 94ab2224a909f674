use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bb8::{ManageConnection, Pool, PooledConnection};
use tokio::sync::Mutex;

use crate::config::ConnectionParams;
use crate::error::SqlConduitError;

pub(crate) type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;
pub(crate) type SqlitePooledConnection = PooledConnection<'static, SqliteManager>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// bb8 manager for `SQLite` connections to one database file.
pub struct SqliteManager {
    path: String,
}

impl SqliteManager {
    #[must_use]
    pub fn new(path: String) -> Self {
        Self { path }
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `SqlConduitError::ConnectError` if pool creation fails.
    pub async fn build_pool(self, max_size: u32) -> Result<Pool<SqliteManager>, SqlConduitError> {
        // a file that cannot be opened will not open on retry either
        Pool::builder()
            .max_size(max_size)
            .retry_connection(false)
            .build(self)
            .await
            .map_err(|e| SqlConduitError::ConnectError(format!("sqlite pool error: {e}")))
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = SqlConduitError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let path = self.path.clone();
        async move {
            let conn = tokio::task::spawn_blocking(move || {
                let conn = rusqlite::Connection::open(&path)?;
                conn.busy_timeout(BUSY_TIMEOUT)?;
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                Ok::<_, SqlConduitError>(conn)
            })
            .await
            .map_err(|e| {
                SqlConduitError::ConnectError(format!("sqlite spawn_blocking join error: {e}"))
            })??;
            tracing::debug!(backend = "sqlite", "connection established");
            Ok(Arc::new(Mutex::new(conn)))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let handle = Arc::clone(conn);
        async move {
            run_blocking(handle, |guard| {
                guard
                    .execute_batch("SELECT 1")
                    .map_err(SqlConduitError::SqliteError)
            })
            .await
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Run `func` against the connection on the blocking pool.
pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, SqlConduitError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlConduitError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| SqlConduitError::ExecuteError(format!("sqlite spawn_blocking join error: {e}")))?
}

/// Build the pool for `params.path` (or `params.database`) and check out one connection.
///
/// Every pooled connection opens its own handle, so `:memory:` gives each connection a
/// separate database; use a file (or a shared-cache `file:` URI) for pooled access.
pub(crate) async fn build_pool(
    params: &ConnectionParams,
) -> Result<Pool<SqliteManager>, SqlConduitError> {
    let path = ConnectionParams::require(params.path.as_ref().or(params.database.as_ref()), "path")?;
    let pool = SqliteManager::new(path.to_string())
        .build_pool(params.pool_size())
        .await?;
    {
        let _smoke = pool.get().await?;
    }
    Ok(pool)
}
