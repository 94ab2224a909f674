use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

use crate::config::{ConnectionParams, default_port};
use crate::error::SqlConduitError;
use crate::types::BackendKind;

/// Translate connection parameters into sqlx connect options.
///
/// # Errors
/// Returns `SqlConduitError::ConfigError` naming the first missing field.
pub(crate) fn connect_options(
    params: &ConnectionParams,
) -> Result<MySqlConnectOptions, SqlConduitError> {
    let host = ConnectionParams::require(params.host.as_ref(), "host")?;
    let database = ConnectionParams::require(params.database.as_ref(), "database")?;
    let user = ConnectionParams::require(params.user.as_ref(), "user")?;

    let mut options = MySqlConnectOptions::new()
        .host(host)
        .port(params.port.unwrap_or_else(|| default_port(BackendKind::Mysql)))
        .username(user)
        .database(database);
    if let Some(password) = params.password.as_deref() {
        options = options.password(password);
    }
    Ok(options)
}

/// Build the pool; sqlx opens one connection up front, which proves the parameters.
pub(crate) async fn build_pool(params: &ConnectionParams) -> Result<MySqlPool, SqlConduitError> {
    let options = connect_options(params)?;
    let pool = MySqlPoolOptions::new()
        .max_connections(params.pool_size())
        .connect_with(options)
        .await?;
    Ok(pool)
}
