use async_trait::async_trait;
use bb8::Pool;
use tokio::sync::oneshot;

use super::config::{PgManager, PgPooledConnection, build_pool};
use super::query::{build_result_set, columns_shape, row_values};
use super::transaction::PgTx;
use crate::backend::{Backend, BackendTx, PoolStatus};
use crate::config::ConnectionParams;
use crate::error::SqlConduitError;
use crate::results::ResultSet;
use crate::stream::{PREFETCH_WINDOW, QueryStream, RowSender, row_channel};
use crate::types::BackendKind;

/// Postgres backend over a bb8 pool of `tokio_postgres` clients.
pub struct PostgresBackend {
    pool: Pool<PgManager>,
    lower_case: bool,
}

impl PostgresBackend {
    pub(crate) async fn connect(
        params: &ConnectionParams,
        lower_case: bool,
    ) -> Result<Self, SqlConduitError> {
        let pool = build_pool(params).await?;
        Ok(Self { pool, lower_case })
    }

    async fn checkout(&self) -> Result<PgPooledConnection, SqlConduitError> {
        Ok(self.pool.get_owned().await?)
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn query(&self, sql: &str) -> Result<ResultSet, SqlConduitError> {
        let conn = self.checkout().await?;
        let rows = conn.query(sql, &[]).await?;
        build_result_set(&rows, self.lower_case)
    }

    async fn execute(&self, sql: &str) -> Result<usize, SqlConduitError> {
        let conn = self.checkout().await?;
        let affected = conn.execute(sql, &[]).await?;
        Ok(usize::try_from(affected).unwrap_or(usize::MAX))
    }

    /// Portal-backed cursor: rows are pulled `PREFETCH_WINDOW` at a time inside a
    /// read transaction that ends when the stream finishes or is dropped.
    async fn stream(
        &self,
        sql: &str,
        object_mode: bool,
    ) -> Result<QueryStream, SqlConduitError> {
        let conn = self.checkout().await?;
        let (sender, stream) = row_channel(object_mode);
        let (ready_tx, ready_rx) = oneshot::channel();
        let sql = sql.to_string();
        let lower_case = self.lower_case;

        tokio::spawn(pump_portal(conn, sql, lower_case, sender, ready_tx));

        match ready_rx.await {
            Ok(Ok(())) => Ok(stream),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SqlConduitError::StreamSetupError(
                "postgres cursor task ended before setup".to_string(),
            )),
        }
    }

    async fn begin(&self) -> Result<BackendTx, SqlConduitError> {
        let conn = self.checkout().await?;
        let tx = PgTx::begin(conn, self.lower_case).await?;
        Ok(BackendTx::Postgres(tx))
    }

    fn status(&self) -> PoolStatus {
        let state = self.pool.state();
        PoolStatus {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    async fn close(&self) {
        tracing::debug!(backend = "postgres", "pool released");
    }
}

async fn pump_portal(
    mut conn: PgPooledConnection,
    sql: String,
    lower_case: bool,
    sender: RowSender,
    ready: oneshot::Sender<Result<(), SqlConduitError>>,
) {
    let setup = async {
        let tx = conn.transaction().await?;
        let stmt = tx.prepare(&sql).await?;
        let portal = tx.bind(&stmt, &[]).await?;
        Ok::<_, tokio_postgres::Error>((tx, stmt, portal))
    };
    let (tx, stmt, portal) = match setup.await {
        Ok(parts) => parts,
        Err(e) => {
            let _ = ready.send(Err(SqlConduitError::StreamSetupError(e.to_string())));
            return;
        }
    };
    let shape = columns_shape(stmt.columns(), lower_case);
    if ready.send(Ok(())).is_err() {
        return;
    }

    let window = i32::try_from(PREFETCH_WINDOW).unwrap_or(i32::MAX);
    'fetch: loop {
        let rows = match tx.query_portal(&portal, window).await {
            Ok(rows) => rows,
            Err(e) => {
                sender.fail(e.into()).await;
                break;
            }
        };
        let exhausted = rows.len() < PREFETCH_WINDOW;
        for row in &rows {
            match row_values(row, shape.width()) {
                Ok(values) => {
                    if !sender.send(shape.row(values)).await {
                        tracing::debug!(backend = "postgres", "stream abandoned by consumer");
                        break 'fetch;
                    }
                }
                Err(e) => {
                    sender.fail(e).await;
                    break 'fetch;
                }
            }
        }
        if exhausted {
            break;
        }
    }

    // read-only cursor; closing the transaction releases the portal
    if let Err(e) = tx.rollback().await {
        tracing::warn!(backend = "postgres", error = %e, "closing stream transaction failed");
    }
}
