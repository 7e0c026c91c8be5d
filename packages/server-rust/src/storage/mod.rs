//! Data source adapters.
//!
//! - [`MemorySource`]: in-memory collection evaluated with the core filter
//!   and sort semantics
//! - [`TimeoutSource`]: wraps any adapter and bounds each call's duration

pub mod memory;
pub mod timeout;

pub use memory::MemorySource;
pub use timeout::TimeoutSource;

/// Failures raised by the bundled adapters.
///
/// Adapters surface these through `anyhow::Error`; the executor wraps them
/// in `QueryError::SourceUnavailable` without inspecting them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },
    #[error("record has no value for key field `{0}`")]
    MissingKey(String),
}
