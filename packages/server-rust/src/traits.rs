use std::sync::Arc;

use async_trait::async_trait;
use folio_core::{FilterSpec, SortSpec};

/// Data store a paginated query runs against.
///
/// Implementations receive storage-neutral filter and sort values and
/// translate them however their backend requires. Adapters own their own
/// timeout and retry policy; the executor never retries.
///
/// Used as `Arc<dyn DataSourceAdapter<T>>` or by reference.
#[async_trait]
pub trait DataSourceAdapter<T: Send + 'static>: Send + Sync {
    /// Rows matching `filter` (including any keyset bound) in `sort` order,
    /// skipping `skip` rows and returning at most `limit`.
    async fn fetch(
        &self,
        filter: &FilterSpec,
        sort: &SortSpec,
        skip: u64,
        limit: u64,
    ) -> anyhow::Result<Vec<T>>;

    /// Number of rows matching `filter`. Only called in offset mode.
    async fn count(&self, filter: &FilterSpec) -> anyhow::Result<u64>;
}

#[async_trait]
impl<T, S> DataSourceAdapter<T> for Arc<S>
where
    S: DataSourceAdapter<T> + ?Sized,
    T: Send + 'static,
{
    async fn fetch(
        &self,
        filter: &FilterSpec,
        sort: &SortSpec,
        skip: u64,
        limit: u64,
    ) -> anyhow::Result<Vec<T>> {
        (**self).fetch(filter, sort, skip, limit).await
    }

    async fn count(&self, filter: &FilterSpec) -> anyhow::Result<u64> {
        (**self).count(filter).await
    }
}
