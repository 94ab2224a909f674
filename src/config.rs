use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::SqlConduitError;
use crate::types::BackendKind;

pub(crate) const DEFAULT_POOL_SIZE: u32 = 10;

/// Backend selection plus connection parameters and identifier options.
///
/// The connector takes this value at construction and gives it up during
/// [`crate::SqlConnector::open`]: once the backend pool exists the parameters (and the
/// password in them) are dropped.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub backend: BackendKind,
    #[serde(default)]
    pub connection: Option<ConnectionParams>,
    /// Lower-case result column names and generated identifiers.
    #[serde(default)]
    pub lower_case_names: bool,
    /// Emit identifiers without the backend's enclosure characters.
    #[serde(default)]
    pub no_brackets: bool,
    /// Prefix for generated table names, e.g. `dbo.`.
    #[serde(default)]
    pub table_prefix: Option<String>,
    /// Window for the request-rate tracker; carried through, never read by the connector.
    #[serde(default)]
    pub request_window_minutes: Option<u32>,
}

/// Backend-native address and credential bundle.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionParams {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    /// SQL Server named instance.
    #[serde(default)]
    pub instance_name: Option<String>,
    /// `SQLite` database file (or `file:` URI).
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    /// SQL Server: accept the server certificate without validation.
    #[serde(default)]
    pub trust_cert: bool,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("instance_name", &self.instance_name)
            .field("path", &self.path)
            .field("max_connections", &self.max_connections)
            .field("trust_cert", &self.trust_cert)
            .finish()
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("backend", &self.backend)
            .field("connection", &self.connection)
            .field("lower_case_names", &self.lower_case_names)
            .field("no_brackets", &self.no_brackets)
            .field("table_prefix", &self.table_prefix)
            .field("request_window_minutes", &self.request_window_minutes)
            .finish()
    }
}

impl ConnectionParams {
    pub(crate) fn require<'a>(
        value: Option<&'a String>,
        what: &str,
    ) -> Result<&'a str, SqlConduitError> {
        match value.map(String::as_str) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(SqlConduitError::ConfigError(format!("{what} is required"))),
        }
    }

    pub(crate) fn pool_size(&self) -> u32 {
        self.max_connections.unwrap_or(DEFAULT_POOL_SIZE).max(1)
    }
}

impl ConnectionConfig {
    fn with_params(backend: BackendKind, params: ConnectionParams) -> Self {
        Self {
            backend,
            connection: Some(params),
            lower_case_names: false,
            no_brackets: false,
            table_prefix: None,
            request_window_minutes: None,
        }
    }

    /// `PostgreSQL` connection parameters.
    #[must_use]
    pub fn postgres(host: &str, port: u16, database: &str, user: &str, password: &str) -> Self {
        Self::with_params(
            BackendKind::Postgres,
            server_params(host, port, database, user, password),
        )
    }

    /// SQL Server connection parameters.
    #[must_use]
    pub fn mssql(host: &str, port: u16, database: &str, user: &str, password: &str) -> Self {
        Self::with_params(
            BackendKind::Mssql,
            server_params(host, port, database, user, password),
        )
    }

    /// `MySQL` / `MariaDB` connection parameters.
    #[must_use]
    pub fn mysql(host: &str, port: u16, database: &str, user: &str, password: &str) -> Self {
        Self::with_params(
            BackendKind::Mysql,
            server_params(host, port, database, user, password),
        )
    }

    /// `SQLite` database at `path`.
    #[must_use]
    pub fn sqlite(path: &str) -> Self {
        Self::with_params(
            BackendKind::Sqlite,
            ConnectionParams {
                path: Some(path.to_string()),
                ..ConnectionParams::default()
            },
        )
    }

    /// Start a fluent builder from these settings.
    #[must_use]
    pub fn builder(self) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder { config: self }
    }

    /// Parse a JSON configuration document.
    ///
    /// # Errors
    /// Returns `SqlConduitError::ConfigError` when the document does not match the layout.
    pub fn from_json_str(json: &str) -> Result<Self, SqlConduitError> {
        serde_json::from_str(json)
            .map_err(|e| SqlConduitError::ConfigError(format!("invalid configuration: {e}")))
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    /// Returns `SqlConduitError::ConfigError` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SqlConduitError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SqlConduitError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Non-secret label used in logs: `database@host:port`, or the file path for `SQLite`.
    #[must_use]
    pub fn label(&self) -> String {
        let Some(params) = &self.connection else {
            return format!("{}:<unconfigured>", self.backend);
        };
        match self.backend {
            BackendKind::Sqlite => params
                .path
                .clone()
                .or_else(|| params.database.clone())
                .unwrap_or_else(|| "sqlite".to_string()),
            kind => format!(
                "{}@{}:{}",
                params.database.as_deref().unwrap_or(""),
                params.host.as_deref().unwrap_or(""),
                params.port.unwrap_or_else(|| default_port(kind)),
            ),
        }
    }
}

pub(crate) fn default_port(kind: BackendKind) -> u16 {
    match kind {
        BackendKind::Postgres => 5432,
        BackendKind::Mssql => 1433,
        BackendKind::Mysql => 3306,
        BackendKind::Sqlite => 0,
    }
}

fn server_params(
    host: &str,
    port: u16,
    database: &str,
    user: &str,
    password: &str,
) -> ConnectionParams {
    ConnectionParams {
        host: Some(host.to_string()),
        port: Some(port),
        user: Some(user.to_string()),
        password: Some(password.to_string()),
        database: Some(database.to_string()),
        ..ConnectionParams::default()
    }
}

/// Fluent builder for connection settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    #[must_use]
    pub fn lower_case_names(mut self, lower_case_names: bool) -> Self {
        self.config.lower_case_names = lower_case_names;
        self
    }

    #[must_use]
    pub fn no_brackets(mut self, no_brackets: bool) -> Self {
        self.config.no_brackets = no_brackets;
        self
    }

    #[must_use]
    pub fn table_prefix(mut self, prefix: &str) -> Self {
        self.config.table_prefix = Some(prefix.to_string());
        self
    }

    #[must_use]
    pub fn request_window_minutes(mut self, minutes: u32) -> Self {
        self.config.request_window_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn max_connections(mut self, max: u32) -> Self {
        if let Some(params) = self.config.connection.as_mut() {
            params.max_connections = Some(max);
        }
        self
    }

    #[must_use]
    pub fn instance_name(mut self, instance: &str) -> Self {
        if let Some(params) = self.config.connection.as_mut() {
            params.instance_name = Some(instance.to_string());
        }
        self
    }

    #[must_use]
    pub fn trust_cert(mut self, trust: bool) -> Self {
        if let Some(params) = self.config.connection.as_mut() {
            params.trust_cert = trust;
        }
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectionConfig {
        self.config
    }
}
