use async_trait::async_trait;
use bb8::Pool;
use futures_util::TryStreamExt;
use tokio::sync::oneshot;

use super::config::{MssqlManager, MssqlPooledConnection, build_pool};
use super::query::{build_result_set, columns_shape, row_values};
use super::transaction::MssqlTx;
use crate::backend::{Backend, BackendTx, PoolStatus};
use crate::config::ConnectionParams;
use crate::error::SqlConduitError;
use crate::results::ResultSet;
use crate::stream::{QueryStream, RowSender, row_channel};
use crate::types::BackendKind;

/// SQL Server backend over a bb8 pool of tiberius clients.
pub struct MssqlBackend {
    pool: Pool<MssqlManager>,
    lower_case: bool,
}

impl MssqlBackend {
    pub(crate) async fn connect(
        params: &ConnectionParams,
        lower_case: bool,
    ) -> Result<Self, SqlConduitError> {
        let pool = build_pool(params).await?;
        Ok(Self { pool, lower_case })
    }

    async fn checkout(&self) -> Result<MssqlPooledConnection, SqlConduitError> {
        Ok(self.pool.get_owned().await?)
    }
}

#[async_trait]
impl Backend for MssqlBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mssql
    }

    async fn query(&self, sql: &str) -> Result<ResultSet, SqlConduitError> {
        let mut conn = self.checkout().await?;
        build_result_set(&mut conn, sql, self.lower_case).await
    }

    async fn execute(&self, sql: &str) -> Result<usize, SqlConduitError> {
        let mut conn = self.checkout().await?;
        let result = conn.execute(sql, &[]).await?;
        let affected: u64 = result.rows_affected().iter().sum();
        Ok(usize::try_from(affected).unwrap_or(usize::MAX))
    }

    /// The TDS row stream is the cursor: rows are read off the socket only as the channel
    /// drains, so the server is throttled by TCP flow control.
    async fn stream(
        &self,
        sql: &str,
        object_mode: bool,
    ) -> Result<QueryStream, SqlConduitError> {
        let conn = self.checkout().await?;
        let (sender, stream) = row_channel(object_mode);
        let (ready_tx, ready_rx) = oneshot::channel();

        tokio::spawn(pump_rows(
            conn,
            sql.to_string(),
            self.lower_case,
            sender,
            ready_tx,
        ));

        match ready_rx.await {
            Ok(Ok(())) => Ok(stream),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SqlConduitError::StreamSetupError(
                "mssql cursor task ended before setup".to_string(),
            )),
        }
    }

    async fn begin(&self) -> Result<BackendTx, SqlConduitError> {
        let conn = self.checkout().await?;
        let tx = MssqlTx::begin(conn, self.lower_case).await?;
        Ok(BackendTx::Mssql(tx))
    }

    fn status(&self) -> PoolStatus {
        let state = self.pool.state();
        PoolStatus {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    async fn close(&self) {
        tracing::debug!(backend = "mssql", "pool released");
    }
}

async fn pump_rows(
    mut conn: MssqlPooledConnection,
    sql: String,
    lower_case: bool,
    sender: RowSender,
    ready: oneshot::Sender<Result<(), SqlConduitError>>,
) {
    let mut stream = match conn.simple_query(sql).await {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(SqlConduitError::StreamSetupError(e.to_string())));
            return;
        }
    };
    let shape = match stream.columns().await {
        Ok(columns) => columns_shape(columns.unwrap_or_default(), lower_case),
        Err(e) => {
            let _ = ready.send(Err(SqlConduitError::StreamSetupError(e.to_string())));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    let mut rows = stream.into_row_stream();
    loop {
        match rows.try_next().await {
            Ok(Some(row)) => match row_values(&row) {
                Ok(values) => {
                    if !sender.send(shape.row(values)).await {
                        tracing::debug!(backend = "mssql", "stream abandoned by consumer");
                        break;
                    }
                }
                Err(e) => {
                    sender.fail(e).await;
                    break;
                }
            },
            Ok(None) => break,
            Err(e) => {
                sender.fail(e.into()).await;
                break;
            }
        }
    }
}
