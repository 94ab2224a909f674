use tokio::runtime::Handle;

use super::config::PgPooledConnection;
use super::query::build_result_set;
use crate::error::SqlConduitError;
use crate::results::ResultSet;

/// Transaction pinned to one pooled Postgres client.
///
/// Dropping without `commit`/`rollback` spawns a best-effort `ROLLBACK` so the client goes
/// back to the pool clean.
///
/// A failed statement aborts the whole transaction on the server, after which `COMMIT`
/// completes as a rollback without raising an error. `aborted` remembers the failure so
/// `commit` can report it.
pub(crate) struct PgTx {
    conn: Option<PgPooledConnection>,
    lower_case: bool,
    aborted: bool,
}

impl PgTx {
    pub(crate) async fn begin(
        conn: PgPooledConnection,
        lower_case: bool,
    ) -> Result<Self, SqlConduitError> {
        conn.simple_query("BEGIN").await?;
        Ok(Self {
            conn: Some(conn),
            lower_case,
            aborted: false,
        })
    }

    fn conn(&self) -> Result<&PgPooledConnection, SqlConduitError> {
        self.conn.as_ref().ok_or_else(|| {
            SqlConduitError::TransactionActError("transaction already finished".to_string())
        })
    }

    pub(crate) async fn execute(&mut self, sql: &str) -> Result<usize, SqlConduitError> {
        let outcome = self.conn()?.execute(sql, &[]).await;
        let affected = self.track(outcome)?;
        Ok(usize::try_from(affected).unwrap_or(usize::MAX))
    }

    pub(crate) async fn query(&mut self, sql: &str) -> Result<ResultSet, SqlConduitError> {
        let outcome = self.conn()?.query(sql, &[]).await;
        let rows = self.track(outcome)?;
        build_result_set(&rows, self.lower_case)
    }

    fn track<T>(
        &mut self,
        outcome: Result<T, tokio_postgres::Error>,
    ) -> Result<T, SqlConduitError> {
        outcome.map_err(|e| {
            self.aborted = true;
            e.into()
        })
    }

    pub(crate) async fn commit(mut self) -> Result<(), SqlConduitError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        if self.aborted {
            if let Err(e) = conn.simple_query("ROLLBACK").await {
                tracing::warn!(
                    backend = "postgres",
                    error = %e,
                    "rollback of aborted transaction failed"
                );
            }
            return Err(SqlConduitError::TransactionCommitError(
                "transaction aborted by an earlier statement error; rolled back".to_string(),
            ));
        }
        if let Err(err) = conn.simple_query("COMMIT").await {
            tracing::warn!(backend = "postgres", error = %err, "commit failed; rolling back");
            if let Err(e) = conn.simple_query("ROLLBACK").await {
                tracing::warn!(
                    backend = "postgres",
                    error = %e,
                    "rollback after failed commit failed"
                );
            }
            return Err(err.into());
        }
        Ok(())
    }

    pub(crate) async fn rollback(mut self) -> Result<(), SqlConduitError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        conn.simple_query("ROLLBACK").await?;
        Ok(())
    }
}

impl Drop for PgTx {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take()
            && let Ok(handle) = Handle::try_current()
        {
            handle.spawn(async move {
                if let Err(e) = conn.simple_query("ROLLBACK").await {
                    tracing::warn!(backend = "postgres", error = %e, "rollback on drop failed");
                }
            });
        }
    }
}
