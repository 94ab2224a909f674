use std::future::Future;

use bb8::{ManageConnection, Pool, PooledConnection};
use tiberius::{AuthMethod, Client, Config as TiberiusConfig, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::config::{ConnectionParams, default_port};
use crate::error::SqlConduitError;
use crate::types::BackendKind;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;
pub(crate) type MssqlPooledConnection = PooledConnection<'static, MssqlManager>;

/// bb8 manager for tiberius clients.
pub struct MssqlManager {
    config: TiberiusConfig,
    named_instance: bool,
}

impl MssqlManager {
    #[must_use]
    pub fn new(config: TiberiusConfig, named_instance: bool) -> Self {
        Self {
            config,
            named_instance,
        }
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `SqlConduitError::ConnectError` if pool creation fails.
    pub async fn build_pool(self, max_size: u32) -> Result<Pool<MssqlManager>, SqlConduitError> {
        Pool::builder()
            .max_size(max_size)
            .build(self)
            .await
            .map_err(|e| SqlConduitError::ConnectError(format!("mssql pool error: {e}")))
    }
}

impl ManageConnection for MssqlManager {
    type Connection = MssqlClient;
    type Error = tiberius::error::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let config = self.config.clone();
        let named_instance = self.named_instance;
        async move {
            // named instances resolve their port through the SQL Browser service
            let tcp = if named_instance {
                TcpStream::connect_named(&config).await?
            } else {
                TcpStream::connect(config.get_addr()).await?
            };
            tcp.set_nodelay(true)?;
            let client = Client::connect(config, tcp.compat_write()).await?;
            tracing::debug!(backend = "mssql", "connection established");
            Ok(client)
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            conn.simple_query("SELECT 1").await?.into_results().await?;
            Ok(())
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Translate connection parameters into a tiberius config.
///
/// # Errors
/// Returns `SqlConduitError::ConfigError` naming the first missing field.
pub(crate) fn build_tiberius_config(
    params: &ConnectionParams,
) -> Result<TiberiusConfig, SqlConduitError> {
    let host = ConnectionParams::require(params.host.as_ref(), "server")?;
    let database = ConnectionParams::require(params.database.as_ref(), "database")?;
    let user = ConnectionParams::require(params.user.as_ref(), "user")?;
    let password = ConnectionParams::require(params.password.as_ref(), "password")?;

    let mut config = TiberiusConfig::new();
    config.host(host);
    config.database(database);
    config.port(params.port.unwrap_or_else(|| default_port(BackendKind::Mssql)));
    config.authentication(AuthMethod::sql_server(user, password));
    if let Some(instance) = &params.instance_name {
        config.instance_name(instance);
    }
    if params.trust_cert {
        config.trust_cert();
    }
    Ok(config)
}

/// Build the pool and check out one connection to prove the parameters.
pub(crate) async fn build_pool(
    params: &ConnectionParams,
) -> Result<Pool<MssqlManager>, SqlConduitError> {
    let config = build_tiberius_config(params)?;
    let pool = MssqlManager::new(config, params.instance_name.is_some())
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
    fn server_is_required() {
        let mut params = ConnectionConfig::mssql("sql01", 1433, "erp", "sa", "pw")
            .connection
            .unwrap();
        let config = build_tiberius_config(&params).unwrap();
        assert_eq!(config.get_addr(), "sql01:1433");

        params.host = None;
        let err = build_tiberius_config(&params).unwrap_err();
        assert!(matches!(err, SqlConduitError::ConfigError(msg) if msg == "server is required"));
    }
}
