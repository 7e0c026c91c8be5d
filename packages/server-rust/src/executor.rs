//! Runs paginated queries against a [`DataSourceAdapter`].
//!
//! The executor composes filter, sort, and window into a [`QueryPlan`],
//! issues the adapter calls the plan needs, and assembles a
//! [`ResultEnvelope`]. It holds only immutable configuration, so one
//! instance can serve any number of concurrent requests.

use std::sync::Arc;
use std::time::Instant;

use folio_core::{
    FieldAccess, FilterSpec, PageRequest, PageWindow, QueryConfig, QueryError, QueryPlan,
    ResultEnvelope, Schema, SortSpec,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use crate::traits::DataSourceAdapter;

/// Executes offset and cursor queries for one allow-list schema.
#[derive(Debug, Clone)]
pub struct PaginatedQueryExecutor {
    schema: Arc<Schema>,
    config: QueryConfig,
}

impl PaginatedQueryExecutor {
    #[must_use]
    pub fn new(schema: Arc<Schema>, config: QueryConfig) -> Self {
        Self { schema, config }
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Parses flat request parameters with this executor's schema and config.
    ///
    /// # Errors
    ///
    /// Returns the first validation or cursor error found in `params`.
    pub fn parse<I, K, V>(&self, params: I) -> Result<PageRequest, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        PageRequest::parse(params, &self.schema, &self.config)
    }

    /// The plan [`execute`](Self::execute) would run, for explain output.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidCursor`] when the cursor does not fit
    /// `sort` or carries values of the wrong type for the schema.
    pub fn plan(
        &self,
        filter: &FilterSpec,
        sort: &SortSpec,
        window: &PageWindow,
    ) -> Result<QueryPlan, QueryError> {
        if let PageWindow::Cursor { after, .. } = window {
            after.check_types(&self.schema)?;
        }
        QueryPlan::new(filter, sort, window)
    }

    /// Fetches one page.
    ///
    /// Offset windows issue `fetch` and `count` concurrently. Cursor windows
    /// issue a single `fetch` of one row more than the page, bounded to rows
    /// strictly after the cursor key. Dropping the returned future cancels
    /// the in-flight adapter calls.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidCursor`] for a cursor issued under another
    /// sort order or holding mistyped values, and [`QueryError::SourceUnavailable`] when the adapter
    /// fails. Adapter failures are never retried here.
    pub async fn execute<T, S>(
        &self,
        filter: &FilterSpec,
        sort: &SortSpec,
        window: &PageWindow,
        source: &S,
    ) -> Result<ResultEnvelope<T>, QueryError>
    where
        T: FieldAccess + Send + 'static,
        S: DataSourceAdapter<T> + ?Sized,
    {
        let plan = self.plan(filter, sort, window)?;

        let span = info_span!(
            "paginated_query",
            mode = window.mode(),
            page_size = window.page_size(),
            sort = %plan.sort,
            items = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        async move {
            let start = Instant::now();
            let result = run(&plan, source).await;

            #[allow(clippy::cast_possible_truncation)]
            let duration_ms = start.elapsed().as_millis() as u64;
            let span = tracing::Span::current();
            span.record("duration_ms", duration_ms);
            match &result {
                Ok(envelope) => {
                    span.record("outcome", "ok");
                    span.record("items", envelope.items.len());
                    debug!(duration_ms, has_next = envelope.pagination.has_next(), "page served");
                }
                Err(e) => {
                    span.record("outcome", e.kind());
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Executes an already parsed request.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn execute_request<T, S>(
        &self,
        request: &PageRequest,
        source: &S,
    ) -> Result<ResultEnvelope<T>, QueryError>
    where
        T: FieldAccess + Send + 'static,
        S: DataSourceAdapter<T> + ?Sized,
    {
        self.execute(&request.filter, &request.sort, &request.window, source)
            .await
    }

    /// Like [`execute`](Self::execute), but abandons the adapter calls as
    /// soon as `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Cancelled`] when cancelled before completion,
    /// otherwise see [`execute`](Self::execute).
    pub async fn execute_cancellable<T, S>(
        &self,
        filter: &FilterSpec,
        sort: &SortSpec,
        window: &PageWindow,
        source: &S,
        cancel: &CancellationToken,
    ) -> Result<ResultEnvelope<T>, QueryError>
    where
        T: FieldAccess + Send + 'static,
        S: DataSourceAdapter<T> + ?Sized,
    {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("query cancelled by caller");
                Err(QueryError::Cancelled)
            }
            result = self.execute(filter, sort, window, source) => result,
        }
    }
}

async fn run<T, S>(plan: &QueryPlan, source: &S) -> Result<ResultEnvelope<T>, QueryError>
where
    T: FieldAccess + Send + 'static,
    S: DataSourceAdapter<T> + ?Sized,
{
    match &plan.window {
        PageWindow::Offset { page, page_size } => {
            let count_filter = plan.count_filter();
            let (items, total) = tokio::try_join!(
                source.fetch(&plan.filter, &plan.sort, plan.skip, plan.limit),
                source.count(&count_filter),
            )
            .map_err(source_failure)?;
            Ok(ResultEnvelope::from_offset_rows(
                items, total, *page, *page_size, &plan.sort,
            ))
        }
        PageWindow::Cursor { page_size, .. } => {
            let items = source
                .fetch(&plan.filter, &plan.sort, plan.skip, plan.limit)
                .await
                .map_err(source_failure)?;
            Ok(ResultEnvelope::from_cursor_rows(items, *page_size, &plan.sort))
        }
    }
}

fn source_failure(error: anyhow::Error) -> QueryError {
    warn!(error = %format!("{error:#}"), "data source call failed");
    QueryError::source_unavailable(error)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
