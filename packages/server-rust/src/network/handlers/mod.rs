//! HTTP handlers and the shared state they extract.

pub mod health;
pub mod items;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use items::{items_handler, plan_handler, ApiError};

use std::sync::Arc;
use std::time::Instant;

use folio_core::Document;

use super::ShutdownController;
use crate::executor::PaginatedQueryExecutor;
use crate::traits::DataSourceAdapter;

/// Shared state passed to handlers via `State` extraction. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Executor bound to the collection's allow-list schema.
    pub executor: Arc<PaginatedQueryExecutor>,
    /// The collection served under `/items`.
    pub source: Arc<dyn DataSourceAdapter<Document>>,
    pub shutdown: Arc<ShutdownController>,
    /// Used for uptime reporting.
    pub start_time: Instant,
}
