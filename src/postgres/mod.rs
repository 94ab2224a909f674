// PostgreSQL backend
//
// - config: bb8 connection manager and pool setup
// - query: value extraction (including binary `numeric`) and result building
// - executor: the backend implementation and the portal-backed stream
// - transaction: transaction pinned to one pooled client

pub mod config;
pub mod executor;
pub(crate) mod query;
pub(crate) mod transaction;

pub use config::PgManager;
pub use executor::PostgresBackend;
