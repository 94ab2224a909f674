use tokio::runtime::Handle;

use super::config::{MssqlClient, MssqlPooledConnection};
use super::query::build_result_set;
use crate::error::SqlConduitError;
use crate::results::ResultSet;

/// Transaction pinned to one pooled SQL Server client.
///
/// Control statements go out as plain batches: `BEGIN TRANSACTION` inside
/// `sp_executesql` would be unbalanced when the procedure returns.
pub(crate) struct MssqlTx {
    conn: Option<MssqlPooledConnection>,
    lower_case: bool,
}

async fn run_batch(client: &mut MssqlClient, sql: &str) -> Result<(), tiberius::error::Error> {
    client.simple_query(sql).await?.into_results().await?;
    Ok(())
}

impl MssqlTx {
    pub(crate) async fn begin(
        mut conn: MssqlPooledConnection,
        lower_case: bool,
    ) -> Result<Self, SqlConduitError> {
        run_batch(&mut conn, "BEGIN TRANSACTION").await?;
        Ok(Self {
            conn: Some(conn),
            lower_case,
        })
    }

    fn client(&mut self) -> Result<&mut MssqlClient, SqlConduitError> {
        self.conn.as_deref_mut().ok_or_else(|| {
            SqlConduitError::TransactionActError("transaction already finished".to_string())
        })
    }

    pub(crate) async fn execute(&mut self, sql: &str) -> Result<usize, SqlConduitError> {
        let result = self.client()?.execute(sql, &[]).await?;
        let affected: u64 = result.rows_affected().iter().sum();
        Ok(usize::try_from(affected).unwrap_or(usize::MAX))
    }

    pub(crate) async fn query(&mut self, sql: &str) -> Result<ResultSet, SqlConduitError> {
        let lower_case = self.lower_case;
        build_result_set(self.client()?, sql, lower_case).await
    }

    pub(crate) async fn commit(mut self) -> Result<(), SqlConduitError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        if let Err(err) = run_batch(&mut conn, "COMMIT TRANSACTION").await {
            tracing::warn!(backend = "mssql", error = %err, "commit failed; rolling back");
            if let Err(e) = run_batch(&mut conn, "IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await
            {
                tracing::warn!(backend = "mssql", error = %e, "rollback after failed commit failed");
            }
            return Err(err.into());
        }
        Ok(())
    }

    pub(crate) async fn rollback(mut self) -> Result<(), SqlConduitError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        run_batch(&mut conn, "ROLLBACK TRANSACTION").await?;
        Ok(())
    }
}

impl Drop for MssqlTx {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take()
            && let Ok(handle) = Handle::try_current()
        {
            handle.spawn(async move {
                if let Err(e) = run_batch(&mut conn, "IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await
                {
                    tracing::warn!(backend = "mssql", error = %e, "rollback on drop failed");
                }
            });
        }
    }
}
