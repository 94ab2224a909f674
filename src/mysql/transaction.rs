use sqlx::{Executor, MySql, Transaction};

use super::query::build_result_set;
use crate::error::SqlConduitError;
use crate::results::ResultSet;

/// Transaction over one pooled `MySQL` connection.
///
/// sqlx queues a `ROLLBACK` itself when an open transaction is dropped, so there is no
/// `Drop` here.
pub(crate) struct MysqlTx {
    tx: Option<Transaction<'static, MySql>>,
    lower_case: bool,
}

impl MysqlTx {
    pub(crate) fn new(tx: Transaction<'static, MySql>, lower_case: bool) -> Self {
        Self {
            tx: Some(tx),
            lower_case,
        }
    }

    fn tx(&mut self) -> Result<&mut Transaction<'static, MySql>, SqlConduitError> {
        self.tx.as_mut().ok_or_else(|| {
            SqlConduitError::TransactionActError("transaction already finished".to_string())
        })
    }

    pub(crate) async fn execute(&mut self, sql: &str) -> Result<usize, SqlConduitError> {
        let tx = self.tx()?;
        let result = Executor::execute(&mut **tx, sqlx::raw_sql(sql)).await?;
        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }

    pub(crate) async fn query(&mut self, sql: &str) -> Result<ResultSet, SqlConduitError> {
        let lower_case = self.lower_case;
        let tx = self.tx()?;
        let rows = Executor::fetch_all(&mut **tx, sqlx::raw_sql(sql)).await?;
        build_result_set(&rows, lower_case)
    }

    pub(crate) async fn commit(mut self) -> Result<(), SqlConduitError> {
        match self.tx.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Ok(()),
        }
    }

    pub(crate) async fn rollback(mut self) -> Result<(), SqlConduitError> {
        match self.tx.take() {
            Some(tx) => Ok(tx.rollback().await?),
            None => Ok(()),
        }
    }
}
