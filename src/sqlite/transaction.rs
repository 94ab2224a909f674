use std::sync::Arc;

use super::config::{SharedSqliteConnection, SqlitePooledConnection, run_blocking};
use super::query::{build_result_set, run_statement};
use crate::error::SqlConduitError;
use crate::results::ResultSet;

/// Transaction pinned to one pooled `SQLite` connection.
///
/// Dropping an unfinished transaction rolls it back before the connection goes back to
/// the pool: on the blocking pool when a runtime is available, inline otherwise.
pub(crate) struct SqliteTx {
    conn: Option<SqlitePooledConnection>,
    lower_case: bool,
}

impl SqliteTx {
    pub(crate) async fn begin(
        conn: SqlitePooledConnection,
        lower_case: bool,
    ) -> Result<Self, SqlConduitError> {
        run_blocking(Arc::clone(&*conn), |c| {
            c.execute_batch("BEGIN").map_err(SqlConduitError::SqliteError)
        })
        .await?;
        Ok(Self {
            conn: Some(conn),
            lower_case,
        })
    }

    fn handle(&self) -> Result<SharedSqliteConnection, SqlConduitError> {
        self.conn
            .as_ref()
            .map(|conn| Arc::clone(&**conn))
            .ok_or_else(|| {
                SqlConduitError::TransactionActError("transaction already finished".to_string())
            })
    }

    pub(crate) async fn execute(&mut self, sql: &str) -> Result<usize, SqlConduitError> {
        let sql = sql.to_string();
        run_blocking(self.handle()?, move |c| run_statement(c, &sql)).await
    }

    pub(crate) async fn query(&mut self, sql: &str) -> Result<ResultSet, SqlConduitError> {
        let sql = sql.to_string();
        let lower_case = self.lower_case;
        run_blocking(self.handle()?, move |c| {
            let mut stmt = c.prepare(&sql)?;
            build_result_set(&mut stmt, lower_case)
        })
        .await
    }

    pub(crate) async fn commit(mut self) -> Result<(), SqlConduitError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        let shared = Arc::clone(&*conn);
        let outcome = run_blocking(Arc::clone(&shared), |c| {
            c.execute_batch("COMMIT").map_err(SqlConduitError::SqliteError)
        })
        .await;
        if let Err(err) = outcome {
            tracing::warn!(backend = "sqlite", error = %err, "commit failed; rolling back");
            if let Err(e) = run_blocking(shared, |c| {
                c.execute_batch("ROLLBACK").map_err(SqlConduitError::SqliteError)
            })
            .await
            {
                tracing::warn!(backend = "sqlite", error = %e, "rollback after failed commit failed");
            }
            return Err(err);
        }
        Ok(())
    }

    pub(crate) async fn rollback(mut self) -> Result<(), SqlConduitError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        run_blocking(Arc::clone(&*conn), |c| {
            c.execute_batch("ROLLBACK").map_err(SqlConduitError::SqliteError)
        })
        .await
    }
}

impl Drop for SqliteTx {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn_blocking(move || {
                let shared = Arc::clone(&*conn);
                let guard = shared.blocking_lock();
                if let Err(e) = guard.execute_batch("ROLLBACK") {
                    tracing::warn!(backend = "sqlite", error = %e, "rollback on drop failed");
                }
            });
        } else if let Ok(guard) = conn.try_lock() {
            let _ = guard.execute_batch("ROLLBACK");
        }
    }
}
