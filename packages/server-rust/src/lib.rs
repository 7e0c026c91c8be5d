//! Folio Server: async paginated query executor, data source adapters, and
//! an axum HTTP binding.

pub mod config;
pub mod executor;
pub mod logging;
pub mod network;
pub mod seed;
pub mod storage;
pub mod traits;

pub use executor::PaginatedQueryExecutor;
pub use storage::{AdapterError, MemorySource, TimeoutSource};
pub use traits::DataSourceAdapter;
