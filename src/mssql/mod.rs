// SQL Server backend
//
// - config: tiberius config from connection parameters, bb8 manager, pool setup
// - query: cell conversion and result building
// - executor: the backend implementation and the TDS row stream
// - transaction: transaction pinned to one pooled client

pub mod config;
pub mod executor;
pub(crate) mod query;
pub(crate) mod transaction;

pub use config::{MssqlClient, MssqlManager};
pub use executor::MssqlBackend;
