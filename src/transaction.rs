use std::fmt;

use crate::backend::BackendTx;
use crate::error::SqlConduitError;
use crate::results::ResultSet;
use crate::types::BackendKind;

/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    NotStarted,
    Active,
    Committed,
    RolledBack,
}

/// One begin…commit/rollback scope, exclusively owned by the caller.
///
/// The handle owns its checked-out connection. `trans_commit` and `trans_rollback` consume
/// it, so a finished handle cannot be reused. Dropping a live handle logs a warning and rolls
/// the transaction back before the connection returns to the pool.
pub struct TransactionHandle {
    connector_id: u64,
    kind: BackendKind,
    tx: Option<BackendTx>,
}

impl TransactionHandle {
    pub(crate) fn new(connector_id: u64, kind: BackendKind, tx: BackendTx) -> Self {
        Self {
            connector_id,
            kind,
            tx: Some(tx),
        }
    }

    #[must_use]
    pub fn state(&self) -> TransactionState {
        if self.tx.is_some() {
            TransactionState::Active
        } else {
            TransactionState::NotStarted
        }
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Id of the connector that began this transaction.
    #[must_use]
    pub fn connector_id(&self) -> u64 {
        self.connector_id
    }

    fn tx_mut(&mut self) -> Result<&mut BackendTx, SqlConduitError> {
        self.tx.as_mut().ok_or_else(|| {
            SqlConduitError::TransactionActError("transaction is not active".to_string())
        })
    }

    pub(crate) async fn execute(&mut self, sql: &str) -> Result<usize, SqlConduitError> {
        self.tx_mut()?.execute(sql).await
    }

    pub(crate) async fn query(&mut self, sql: &str) -> Result<ResultSet, SqlConduitError> {
        self.tx_mut()?.query(sql).await
    }

    pub(crate) async fn commit(mut self) -> Result<TransactionState, SqlConduitError> {
        match self.tx.take() {
            Some(tx) => tx.commit().await.map(|()| TransactionState::Committed),
            None => Ok(TransactionState::NotStarted),
        }
    }

    pub(crate) async fn rollback(mut self) -> Result<TransactionState, SqlConduitError> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map(|()| TransactionState::RolledBack),
            None => Ok(TransactionState::NotStarted),
        }
    }
}

impl Drop for TransactionHandle {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!(
                backend = %self.kind,
                connector = self.connector_id,
                "transaction handle dropped while active; rolling back"
            );
        }
    }
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("connector_id", &self.connector_id)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}
