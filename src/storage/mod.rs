pub mod traits;
pub mod duckdb;

pub use duckdb::DuckDbStorage;
pub use traits::{SessionSummary, Storage, StorageError};
