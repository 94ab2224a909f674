use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{Backend, ConduitPool, PoolStatus};
use crate::config::ConnectionConfig;
use crate::error::SqlConduitError;
use crate::results::ResultSet;
use crate::sanitize::Sanitizer;
use crate::stream::QueryStream;
use crate::transaction::{TransactionHandle, TransactionState};
use crate::type_map::TypeMap;
use crate::types::{BackendKind, ConnectorState, Enclosure};

static NEXT_CONNECTOR_ID: AtomicU64 = AtomicU64::new(1);

/// One logical database connection: a backend pool plus the identifier rules used to build
/// SQL for it.
///
/// Plain methods (`query`, `execute`, `stream_query`, `trans_commit`, ...) log failures and
/// return a sentinel: an empty result set, `-1`, `None` or `false`. The `try_` variants return
/// the error instead.
///
/// ```rust,no_run
/// use sql_conduit::prelude::*;
///
/// # async fn demo() -> Result<(), SqlConduitError> {
/// let mut db = SqlConnector::new(ConnectionConfig::sqlite("app.db"));
/// if !db.open().await {
///     return Err(SqlConduitError::ConnectError("cannot open app.db".into()));
/// }
/// let rows = db.try_query("SELECT 1 AS one", None).await?;
/// assert_eq!(rows.results[0].get("one"), Some(&RowValues::Int(1)));
/// db.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqlConnector {
    id: u64,
    kind: BackendKind,
    label: String,
    enclosure: Enclosure,
    lower_case_names: bool,
    no_brackets: bool,
    table_prefix: Option<String>,
    request_window_minutes: Option<u32>,
    config: Option<ConnectionConfig>,
    pool: Option<ConduitPool>,
}

impl SqlConnector {
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            id: NEXT_CONNECTOR_ID.fetch_add(1, Ordering::Relaxed),
            kind: config.backend,
            label: config.label(),
            enclosure: config.backend.enclosure(),
            lower_case_names: config.lower_case_names,
            no_brackets: config.no_brackets,
            table_prefix: config.table_prefix.clone(),
            request_window_minutes: config.request_window_minutes,
            config: Some(config),
            pool: None,
        }
    }

    /// Build the backend pool; `false` (logged) on any failure.
    ///
    /// The connection parameters are dropped once the pool is up. After a failure they are
    /// kept so `open` can be retried.
    pub async fn open(&mut self) -> bool {
        match self.try_open().await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(
                    db = %self.label,
                    backend = %self.kind,
                    error = %err,
                    "open failed"
                );
                false
            }
        }
    }

    /// [`SqlConnector::open`] returning the failure.
    ///
    /// # Errors
    /// `ConfigMissing` when no connection parameters are left, `ConfigError` for missing
    /// fields, `Unsupported` for a backend not compiled in, or the driver's connect error.
    pub async fn try_open(&mut self) -> Result<(), SqlConduitError> {
        if self.pool.is_some() {
            tracing::info!(db = %self.label, backend = %self.kind, "already open");
            return Ok(());
        }
        let config = self.config.take().ok_or(SqlConduitError::ConfigMissing)?;
        let Some(params) = config.connection.as_ref() else {
            self.config = Some(config);
            return Err(SqlConduitError::ConfigMissing);
        };

        match ConduitPool::connect(self.kind, params, self.lower_case_names).await {
            Ok(pool) => {
                self.pool = Some(pool);
                tracing::info!(db = %self.label, backend = %self.kind, "opened");
                Ok(())
            }
            Err(err) => {
                self.config = Some(config);
                Err(err)
            }
        }
    }

    /// Release the backend pool. Never fails.
    pub async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.backend().close().await;
            tracing::info!(db = %self.label, backend = %self.kind, "closed");
        }
    }

    fn backend(&self) -> Result<&dyn Backend, SqlConduitError> {
        self.pool
            .as_ref()
            .map(ConduitPool::backend)
            .ok_or_else(|| SqlConduitError::BackendUnset(self.label.clone()))
    }

    fn log_failure(&self, op: &str, request_id: Option<&str>, err: &SqlConduitError) {
        tracing::error!(
            db = %self.label,
            backend = %self.kind,
            request_id = request_id.unwrap_or_default(),
            error = %err,
            "{op} failed"
        );
    }

    fn log_sql(&self, op: &str, request_id: Option<&str>, sql: &str) {
        tracing::debug!(
            db = %self.label,
            backend = %self.kind,
            request_id = request_id.unwrap_or_default(),
            sql,
            "{op}"
        );
    }

    /// Run a statement and collect its rows.
    ///
    /// # Errors
    /// `BackendUnset` before a successful open, otherwise the backend's error.
    pub async fn try_query(
        &self,
        sql: &str,
        request_id: Option<&str>,
    ) -> Result<ResultSet, SqlConduitError> {
        self.log_sql("query", request_id, sql);
        self.backend()?.query(sql).await
    }

    /// Rows of `sql`; empty when the connector is closed or the statement fails.
    pub async fn query(&self, sql: &str, request_id: Option<&str>) -> ResultSet {
        self.try_query(sql, request_id).await.unwrap_or_else(|err| {
            self.log_failure("query", request_id, &err);
            ResultSet::default()
        })
    }

    /// Run a statement and return the affected-row count.
    ///
    /// # Errors
    /// `BackendUnset` before a successful open, otherwise the backend's error.
    pub async fn try_execute(
        &self,
        sql: &str,
        request_id: Option<&str>,
    ) -> Result<usize, SqlConduitError> {
        self.log_sql("execute", request_id, sql);
        self.backend()?.execute(sql).await
    }

    /// Affected-row count; `-1` signals failure.
    pub async fn execute(&self, sql: &str, request_id: Option<&str>) -> i64 {
        match self.try_execute(sql, request_id).await {
            Ok(affected) => i64::try_from(affected).unwrap_or(i64::MAX),
            Err(err) => {
                self.log_failure("execute", request_id, &err);
                -1
            }
        }
    }

    /// Open a bounded, lazy stream over the rows of `sql`.
    ///
    /// # Errors
    /// `BackendUnset` before a successful open, `StreamSetupError` when the backend cursor
    /// cannot be created, or the pool's checkout error.
    pub async fn try_stream_query(
        &self,
        sql: &str,
        object_mode: bool,
        request_id: Option<&str>,
    ) -> Result<QueryStream, SqlConduitError> {
        self.log_sql("stream", request_id, sql);
        self.backend()?.stream(sql, object_mode).await
    }

    /// Stream of records (`object_mode`) or JSON lines; `None` when no cursor could be
    /// created.
    pub async fn stream_query(
        &self,
        sql: &str,
        object_mode: bool,
        request_id: Option<&str>,
    ) -> Option<QueryStream> {
        match self.try_stream_query(sql, object_mode, request_id).await {
            Ok(stream) => Some(stream),
            Err(err) => {
                self.log_failure("stream", request_id, &err);
                None
            }
        }
    }

    /// Check out a dedicated connection and start a transaction on it.
    ///
    /// # Errors
    /// `BackendUnset` before a successful open, `TransactionBeginError` otherwise.
    pub async fn trans_begin(
        &self,
        request_id: Option<&str>,
    ) -> Result<TransactionHandle, SqlConduitError> {
        let result = match self.backend() {
            Ok(backend) => backend
                .begin()
                .await
                .map_err(|e| SqlConduitError::TransactionBeginError(e.to_string())),
            Err(err) => Err(err),
        };
        match result {
            Ok(tx) => Ok(TransactionHandle::new(self.id, self.kind, tx)),
            Err(err) => {
                self.log_failure("transaction begin", request_id, &err);
                Err(err)
            }
        }
    }

    fn check_handle(&self, handle: &TransactionHandle) -> Result<(), SqlConduitError> {
        if handle.connector_id() == self.id {
            Ok(())
        } else {
            Err(SqlConduitError::HandleMismatch(format!(
                "handle of connector {} used with connector {} ({})",
                handle.connector_id(),
                self.id,
                self.label
            )))
        }
    }

    /// Run one statement inside the transaction and return the affected-row count.
    ///
    /// A failure leaves the transaction open; the caller still has to roll it back.
    ///
    /// # Errors
    /// `HandleMismatch` for a handle of another connector, `TransactionActError` otherwise.
    pub async fn trans_execute(
        &self,
        handle: &mut TransactionHandle,
        sql: &str,
        request_id: Option<&str>,
    ) -> Result<usize, SqlConduitError> {
        self.log_sql("transaction execute", request_id, sql);
        let result = match self.check_handle(handle) {
            Ok(()) => handle
                .execute(sql)
                .await
                .map_err(|e| SqlConduitError::TransactionActError(e.to_string())),
            Err(err) => Err(err),
        };
        result.inspect_err(|err| self.log_failure("transaction act", request_id, err))
    }

    /// [`SqlConnector::trans_execute`] without the count.
    ///
    /// # Errors
    /// See [`SqlConnector::trans_execute`].
    pub async fn trans_act(
        &self,
        handle: &mut TransactionHandle,
        sql: &str,
        request_id: Option<&str>,
    ) -> Result<(), SqlConduitError> {
        self.trans_execute(handle, sql, request_id).await.map(|_| ())
    }

    /// Run a row-returning statement inside the transaction.
    ///
    /// # Errors
    /// `HandleMismatch` for a handle of another connector, `TransactionActError` otherwise.
    pub async fn trans_query(
        &self,
        handle: &mut TransactionHandle,
        sql: &str,
        request_id: Option<&str>,
    ) -> Result<ResultSet, SqlConduitError> {
        self.log_sql("transaction query", request_id, sql);
        let result = match self.check_handle(handle) {
            Ok(()) => handle
                .query(sql)
                .await
                .map_err(|e| SqlConduitError::TransactionActError(e.to_string())),
            Err(err) => Err(err),
        };
        result.inspect_err(|err| self.log_failure("transaction query", request_id, err))
    }

    /// Commit and release the connection.
    ///
    /// A failed commit is followed by a best-effort rollback; the connection goes back to the
    /// pool either way. A handle of another connector is rolled back, never committed.
    ///
    /// # Errors
    /// `HandleMismatch` or `TransactionCommitError`.
    pub async fn try_trans_commit(
        &self,
        handle: TransactionHandle,
        request_id: Option<&str>,
    ) -> Result<TransactionState, SqlConduitError> {
        self.check_handle(&handle)?;
        handle.commit().await.map_err(|e| {
            let err = SqlConduitError::TransactionCommitError(e.to_string());
            self.log_failure("transaction commit", request_id, &err);
            err
        })
    }

    /// [`SqlConnector::try_trans_commit`] reporting success as a boolean.
    pub async fn trans_commit(&self, handle: TransactionHandle, request_id: Option<&str>) -> bool {
        match self.try_trans_commit(handle, request_id).await {
            Ok(_) => true,
            Err(err) => {
                if matches!(err, SqlConduitError::HandleMismatch(_)) {
                    self.log_failure("transaction commit", request_id, &err);
                }
                false
            }
        }
    }

    /// Roll back and release the connection.
    ///
    /// # Errors
    /// `HandleMismatch` or `TransactionRollbackError`.
    pub async fn try_trans_rollback(
        &self,
        handle: TransactionHandle,
        request_id: Option<&str>,
    ) -> Result<TransactionState, SqlConduitError> {
        self.check_handle(&handle)?;
        handle.rollback().await.map_err(|e| {
            let err = SqlConduitError::TransactionRollbackError(e.to_string());
            self.log_failure("transaction rollback", request_id, &err);
            err
        })
    }

    /// [`SqlConnector::try_trans_rollback`] reporting success as a boolean.
    pub async fn trans_rollback(&self, handle: TransactionHandle, request_id: Option<&str>) -> bool {
        match self.try_trans_rollback(handle, request_id).await {
            Ok(_) => true,
            Err(err) => {
                if matches!(err, SqlConduitError::HandleMismatch(_)) {
                    self.log_failure("transaction rollback", request_id, &err);
                }
                false
            }
        }
    }

    /// Quote an identifier for this backend.
    ///
    /// Dotted names are enclosed per segment; `lower_case_names` and `no_brackets` apply.
    #[must_use]
    pub fn enclose(&self, identifier: &str) -> String {
        identifier
            .split('.')
            .map(|segment| {
                let segment = if self.lower_case_names {
                    segment.to_lowercase()
                } else {
                    segment.to_string()
                };
                if self.no_brackets {
                    segment
                } else {
                    self.enclosure.wrap(&segment)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    #[must_use]
    pub fn sanitizer(&self) -> Sanitizer {
        Sanitizer::new(self.kind)
    }

    #[must_use]
    pub fn type_map(&self) -> &'static TypeMap {
        TypeMap::for_backend(self.kind)
    }

    /// Pool connection counts, `None` while closed.
    #[must_use]
    pub fn pool_status(&self) -> Option<PoolStatus> {
        self.pool.as_ref().map(|pool| pool.backend().status())
    }

    #[must_use]
    pub fn state(&self) -> ConnectorState {
        if self.pool.is_some() {
            ConnectorState::Open
        } else {
            ConnectorState::Closed
        }
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Non-secret database label used in log fields.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn table_prefix(&self) -> Option<&str> {
        self.table_prefix.as_deref()
    }

    #[must_use]
    pub fn lower_case_names(&self) -> bool {
        self.lower_case_names
    }

    #[must_use]
    pub fn request_window_minutes(&self) -> Option<u32> {
        self.request_window_minutes
    }
}
