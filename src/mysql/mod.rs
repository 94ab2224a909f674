// MySQL / MariaDB backend
//
// - config: sqlx connect options and pool setup
// - query: value extraction and result building
// - executor: the backend implementation and the protocol row stream
// - transaction: sqlx transaction wrapper

pub(crate) mod config;
pub mod executor;
pub(crate) mod query;
pub(crate) mod transaction;

pub use executor::MysqlBackend;
