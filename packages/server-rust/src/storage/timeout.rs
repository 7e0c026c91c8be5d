//! Per-call deadline for any data source.
//!
//! Timeout policy belongs to the adapter layer: the executor propagates the
//! resulting error as `SourceUnavailable` like any other adapter failure.

use std::time::Duration;

use async_trait::async_trait;
use folio_core::{FilterSpec, SortSpec};

use super::AdapterError;
use crate::traits::DataSourceAdapter;

/// Adapter wrapper that fails `fetch` and `count` calls exceeding `timeout`.
pub struct TimeoutSource<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimeoutSource<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn elapsed(&self, operation: &'static str) -> anyhow::Error {
        #[allow(clippy::cast_possible_truncation)]
        let timeout_ms = self.timeout.as_millis() as u64;
        tracing::warn!(operation, timeout_ms, "data source call timed out");
        AdapterError::Timeout {
            operation,
            timeout_ms,
        }
        .into()
    }
}

#[async_trait]
impl<S, T> DataSourceAdapter<T> for TimeoutSource<S>
where
    S: DataSourceAdapter<T>,
    T: Send + 'static,
{
    async fn fetch(
        &self,
        filter: &FilterSpec,
        sort: &SortSpec,
        skip: u64,
        limit: u64,
    ) -> anyhow::Result<Vec<T>> {
        match tokio::time::timeout(self.timeout, self.inner.fetch(filter, sort, skip, limit)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(self.elapsed("fetch")),
        }
    }

    async fn count(&self, filter: &FilterSpec) -> anyhow::Result<u64> {
        match tokio::time::timeout(self.timeout, self.inner.count(filter)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(self.elapsed("count")),
        }
    }
}

#[cfg(test)]
mod tests {
    use folio_core::{Document, FieldDescriptor, Schema};

    use super::*;
    use crate::storage::MemorySource;

    /// Source whose calls never complete.
    struct Stalled;

    #[async_trait]
    impl DataSourceAdapter<Document> for Stalled {
        async fn fetch(
            &self,
            _filter: &FilterSpec,
            _sort: &SortSpec,
            _skip: u64,
            _limit: u64,
        ) -> anyhow::Result<Vec<Document>> {
            std::future::pending().await
        }

        async fn count(&self, _filter: &FilterSpec) -> anyhow::Result<u64> {
            std::future::pending().await
        }
    }

    fn schema() -> Schema {
        Schema::new([FieldDescriptor::string("id")], "id").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_calls_fail_with_timeout() {
        let source = TimeoutSource::new(Stalled, Duration::from_millis(250));
        let sort = SortSpec::tie_break_only(&schema());

        let err = source
            .fetch(&FilterSpec::empty(), &sort, 0, 10)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<AdapterError>(),
            Some(&AdapterError::Timeout {
                operation: "fetch",
                timeout_ms: 250
            })
        );

        let err = source.count(&FilterSpec::empty()).await.unwrap_err();
        assert!(err.to_string().contains("count timed out after 250ms"));
    }

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let inner = MemorySource::for_schema(&schema());
        inner
            .insert(Document::default().with("id", "only"))
            .unwrap();
        let source = TimeoutSource::new(inner, Duration::from_secs(5));

        assert_eq!(source.count(&FilterSpec::empty()).await.unwrap(), 1);
        assert_eq!(source.inner().len(), 1);
    }
}
