use std::sync::Arc;

use async_trait::async_trait;
use bb8::Pool;
use tokio::sync::oneshot;

use super::config::{SqliteManager, SqlitePooledConnection, build_pool, run_blocking};
use super::query::{build_result_set, row_values, run_statement, statement_shape};
use super::transaction::SqliteTx;
use crate::backend::{Backend, BackendTx, PoolStatus};
use crate::config::ConnectionParams;
use crate::error::SqlConduitError;
use crate::results::ResultSet;
use crate::stream::{QueryStream, row_channel};
use crate::types::BackendKind;

/// Embedded backend: a bb8 pool of `rusqlite` connections driven on the blocking pool.
pub struct SqliteBackend {
    pool: Pool<SqliteManager>,
    lower_case: bool,
}

impl SqliteBackend {
    pub(crate) async fn connect(
        params: &ConnectionParams,
        lower_case: bool,
    ) -> Result<Self, SqlConduitError> {
        let pool = build_pool(params).await?;
        Ok(Self { pool, lower_case })
    }

    async fn checkout(&self) -> Result<SqlitePooledConnection, SqlConduitError> {
        Ok(self.pool.get_owned().await?)
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn query(&self, sql: &str) -> Result<ResultSet, SqlConduitError> {
        let conn = self.checkout().await?;
        let sql = sql.to_string();
        let lower_case = self.lower_case;
        run_blocking(Arc::clone(&*conn), move |c| {
            let mut stmt = c.prepare(&sql)?;
            build_result_set(&mut stmt, lower_case)
        })
        .await
    }

    async fn execute(&self, sql: &str) -> Result<usize, SqlConduitError> {
        let conn = self.checkout().await?;
        let sql = sql.to_string();
        run_blocking(Arc::clone(&*conn), move |c| run_statement(c, &sql)).await
    }

    /// Emulates a cursor: one prepared statement stepped a row at a time on a blocking
    /// thread, finalized when the rows run out or the consumer drops the stream.
    async fn stream(
        &self,
        sql: &str,
        object_mode: bool,
    ) -> Result<QueryStream, SqlConduitError> {
        let pooled = self.checkout().await?;
        let (sender, stream) = row_channel(object_mode);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), SqlConduitError>>();
        let sql = sql.to_string();
        let lower_case = self.lower_case;

        tokio::task::spawn_blocking(move || {
            // declared first so the connection returns to the pool after the statement is gone
            let pooled = pooled;
            let shared = Arc::clone(&*pooled);
            let guard = shared.blocking_lock();

            let mut stmt = match guard.prepare(&sql) {
                Ok(stmt) => stmt,
                Err(e) => {
                    let _ = ready_tx.send(Err(SqlConduitError::StreamSetupError(e.to_string())));
                    return;
                }
            };
            let shape = statement_shape(&stmt, lower_case);
            let mut rows = match stmt.query([]) {
                Ok(rows) => rows,
                Err(e) => {
                    let _ = ready_tx.send(Err(SqlConduitError::StreamSetupError(e.to_string())));
                    return;
                }
            };
            if ready_tx.send(Ok(())).is_err() {
                return;
            }

            loop {
                match rows.next() {
                    Ok(Some(row)) => match row_values(row, shape.width()) {
                        Ok(values) => {
                            if !sender.blocking_send(shape.row(values)) {
                                tracing::debug!(backend = "sqlite", "stream abandoned by consumer");
                                break;
                            }
                        }
                        Err(e) => {
                            sender.blocking_fail(e);
                            break;
                        }
                    },
                    Ok(None) => break,
                    Err(e) => {
                        sender.blocking_fail(e.into());
                        break;
                    }
                }
            }
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(stream),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SqlConduitError::StreamSetupError(
                "sqlite cursor task ended before setup".to_string(),
            )),
        }
    }

    async fn begin(&self) -> Result<BackendTx, SqlConduitError> {
        let conn = self.checkout().await?;
        let tx = SqliteTx::begin(conn, self.lower_case).await?;
        Ok(BackendTx::Sqlite(tx))
    }

    fn status(&self) -> PoolStatus {
        let state = self.pool.state();
        PoolStatus {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    async fn close(&self) {
        // bb8 closes idle connections when the last pool handle drops
        tracing::debug!(backend = "sqlite", "pool released");
    }
}
