use std::future::Future;

use bb8::{ManageConnection, Pool, PooledConnection};
use tokio_postgres::{Client, NoTls};

use crate::config::{ConnectionParams, default_port};
use crate::error::SqlConduitError;
use crate::types::BackendKind;

pub(crate) type PgPooledConnection = PooledConnection<'static, PgManager>;

/// bb8 manager for Postgres clients.
pub struct PgManager {
    pub(crate) config: tokio_postgres::Config,
}

impl PgManager {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self { config }
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `SqlConduitError::ConnectError` if pool creation fails.
    pub async fn build_pool(self, max_size: u32) -> Result<Pool<PgManager>, SqlConduitError> {
        Pool::builder()
            .max_size(max_size)
            .build(self)
            .await
            .map_err(|e| SqlConduitError::ConnectError(format!("postgres pool error: {e}")))
    }
}

impl ManageConnection for PgManager {
    type Connection = Client;
    type Error = tokio_postgres::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.config.clone();
        async move {
            tracing::debug!(
                backend = "postgres",
                hosts = ?cfg.get_hosts(),
                db = ?cfg.get_dbname(),
                "connect start"
            );
            let (client, connection) = cfg.connect(NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::warn!(backend = "postgres", error = %e, "connection task ended");
                }
            });
            Ok(client)
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

/// Translate connection parameters into a driver config.
///
/// # Errors
/// Returns `SqlConduitError::ConfigError` naming the first missing field.
pub(crate) fn pg_config(params: &ConnectionParams) -> Result<tokio_postgres::Config, SqlConduitError> {
    let dbname = ConnectionParams::require(params.database.as_ref(), "dbname")?;
    let host = ConnectionParams::require(params.host.as_ref(), "host")?;
    let user = ConnectionParams::require(params.user.as_ref(), "user")?;
    let password = ConnectionParams::require(params.password.as_ref(), "password")?;

    let mut cfg = tokio_postgres::Config::new();
    cfg.dbname(dbname)
        .host(host)
        .port(params.port.unwrap_or_else(|| default_port(BackendKind::Postgres)))
        .user(user)
        .password(password);
    Ok(cfg)
}

/// Build the pool and check out one connection to prove the parameters.
pub(crate) async fn build_pool(params: &ConnectionParams) -> Result<Pool<PgManager>, SqlConduitError> {
    let pool = PgManager::new(pg_config(params)?)
        .build_pool(params.pool_size())
        .await?;
    {
        let _smoke = pool.get().await?;
    }
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;

    #[test]
    fn missing_fields_are_named() {
        let mut params = ConnectionConfig::postgres("db1", 5433, "shop", "app", "pw")
            .connection
            .unwrap();
        let cfg = pg_config(&params).unwrap();
        assert_eq!(cfg.get_dbname(), Some("shop"));
        assert_eq!(cfg.get_ports(), [5433]);

        params.password = None;
        let err = pg_config(&params).unwrap_err();
        assert!(matches!(err, SqlConduitError::ConfigError(msg) if msg == "password is required"));
    }
}
