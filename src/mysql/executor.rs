use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::{Executor, MySql};
use sqlx::mysql::MySqlPool;
use sqlx::pool::PoolConnection;
use tokio::sync::oneshot;

use super::config::build_pool;
use super::query::{build_result_set, row_shape, row_values};
use super::transaction::MysqlTx;
use crate::backend::{Backend, BackendTx, PoolStatus};
use crate::config::ConnectionParams;
use crate::error::SqlConduitError;
use crate::results::{ResultSet, RowShape};
use crate::stream::{QueryStream, RowSender, row_channel};
use crate::types::BackendKind;

/// `MySQL` / `MariaDB` backend over an sqlx pool.
pub struct MysqlBackend {
    pool: MySqlPool,
    lower_case: bool,
}

impl MysqlBackend {
    pub(crate) async fn connect(
        params: &ConnectionParams,
        lower_case: bool,
    ) -> Result<Self, SqlConduitError> {
        let pool = build_pool(params).await?;
        Ok(Self { pool, lower_case })
    }
}

#[async_trait]
impl Backend for MysqlBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mysql
    }

    async fn query(&self, sql: &str) -> Result<ResultSet, SqlConduitError> {
        let mut conn = self.pool.acquire().await?;
        let rows = Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql)).await?;
        build_result_set(&rows, self.lower_case)
    }

    async fn execute(&self, sql: &str) -> Result<usize, SqlConduitError> {
        let mut conn = self.pool.acquire().await?;
        let result = Executor::execute(&mut *conn, sqlx::raw_sql(sql)).await?;
        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }

    /// The protocol row stream is the cursor; statement errors surface with the first
    /// fetch, so setup waits for the first row (or the end) before returning.
    async fn stream(
        &self,
        sql: &str,
        object_mode: bool,
    ) -> Result<QueryStream, SqlConduitError> {
        let conn = self.pool.acquire().await?;
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
                "mysql cursor task ended before setup".to_string(),
            )),
        }
    }

    async fn begin(&self) -> Result<BackendTx, SqlConduitError> {
        let tx = self.pool.begin().await?;
        Ok(BackendTx::Mysql(MysqlTx::new(tx, self.lower_case)))
    }

    fn status(&self) -> PoolStatus {
        let idle = u32::try_from(self.pool.num_idle()).unwrap_or(u32::MAX);
        PoolStatus {
            connections: self.pool.size(),
            idle_connections: idle,
        }
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::debug!(backend = "mysql", "pool closed");
    }
}

async fn pump_rows(
    mut conn: PoolConnection<MySql>,
    sql: String,
    lower_case: bool,
    sender: RowSender,
    ready: oneshot::Sender<Result<(), SqlConduitError>>,
) {
    let mut rows = Executor::fetch(&mut *conn, sqlx::raw_sql(&sql));

    let mut shape: Option<RowShape> = None;
    let mut ready = Some(ready);
    loop {
        let next = rows.try_next().await;
        if let Some(ready) = ready.take() {
            let setup = match &next {
                Err(e) => Err(SqlConduitError::StreamSetupError(e.to_string())),
                Ok(_) => Ok(()),
            };
            let failed = setup.is_err();
            if ready.send(setup).is_err() || failed {
                return;
            }
        }
        match next {
            Ok(Some(row)) => {
                let shape = shape.get_or_insert_with(|| row_shape(&row, lower_case));
                match row_values(&row) {
                    Ok(values) => {
                        if !sender.send(shape.row(values)).await {
                            tracing::debug!(backend = "mysql", "stream abandoned by consumer");
                            break;
                        }
                    }
                    Err(e) => {
                        sender.fail(e).await;
                        break;
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                sender.fail(e.into()).await;
                break;
            }
        }
    }
}
