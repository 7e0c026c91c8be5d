use serde::Serialize;

use crate::cursor::SeekBound;
use crate::error::QueryError;
use crate::filter::FilterSpec;
use crate::sort::SortSpec;
use crate::window::PageWindow;

/// One fetch, fully resolved: what a data source is asked to run.
///
/// In cursor mode the filter carries the keyset bound, nothing is skipped,
/// and one lookahead row is requested beyond the page. Offset mode additionally
/// needs a count of the unbounded filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub filter: FilterSpec,
    pub sort: SortSpec,
    pub skip: u64,
    pub limit: u64,
    pub count: bool,
    pub window: PageWindow,
}

impl QueryPlan {
    /// Composes a filter, sort, and window into a plan.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidCursor`] when a cursor window was issued
    /// for different sort fields.
    pub fn new(
        filter: &FilterSpec,
        sort: &SortSpec,
        window: &PageWindow,
    ) -> Result<Self, QueryError> {
        window.check_cursor_shape(sort)?;

        let filter = match window {
            PageWindow::Cursor { after, .. } => {
                filter.without_seek().with_seek(SeekBound::after(sort, after))
            }
            PageWindow::Offset { .. } => filter.without_seek(),
        };

        Ok(Self {
            filter,
            sort: sort.clone(),
            skip: window.skip(),
            limit: window.fetch_limit(),
            count: !window.is_cursor(),
            window: window.clone(),
        })
    }

    /// The filter to count with: the plan's filter minus any keyset bound.
    #[must_use]
    pub fn count_filter(&self) -> FilterSpec {
        self.filter.without_seek()
    }
}
