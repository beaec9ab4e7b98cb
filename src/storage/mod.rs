// storage/mod.rs
// Durable failed-batch storage

pub mod headers;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod store;
#[cfg(test)]
pub mod test_helpers;

// Re-export commonly used items
pub use headers::{flatten_headers, parse_flattened_headers};
pub use memory::MemoryBatchStore;
pub use migrations::run_migrations;
pub use models::DurableBatchRecord;
pub use pool::init_db_pool_with_path;
pub use store::{FailedBatchStore, SqliteBatchStore};
