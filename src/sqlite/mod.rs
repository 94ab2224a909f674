// SQLite backend
//
// - config: bb8 connection manager, pool setup, blocking-pool helper
// - query: value extraction and result building
// - executor: the backend implementation, including the emulated cursor
// - transaction: transaction pinned to one pooled connection

pub mod config;
pub mod executor;
pub(crate) mod query;
pub(crate) mod transaction;

pub use config::SqliteManager;
pub use executor::SqliteBackend;
