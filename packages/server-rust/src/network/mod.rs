//! HTTP binding: configuration, middleware, handlers, and serving lifecycle.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use config::*;
pub use handlers::{ApiError, AppState};
pub use module::NetworkModule;
pub use shutdown::*;
