//! One-stop parsing of a flat parameter list into filter, sort, and window.

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::filter::{FilterBuilder, FilterSpec, UnknownFieldPolicy};
use crate::plan::QueryPlan;
use crate::schema::Schema;
use crate::sort::{SortInput, SortSpec};
use crate::window::{PageWindow, WindowConfig};

/// Request-level configuration: page bounds, unknown-field policy, and the
/// names of the pagination parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryConfig {
    pub window: WindowConfig,
    pub unknown_fields: UnknownFieldPolicy,
    pub page_param: String,
    pub limit_param: String,
    pub cursor_param: String,
    pub sort_param: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            unknown_fields: UnknownFieldPolicy::default(),
            page_param: "page".to_string(),
            limit_param: "limit".to_string(),
            cursor_param: "cursor".to_string(),
            sort_param: "sort".to_string(),
        }
    }
}

impl QueryConfig {
    fn reserved(&self) -> [&str; 4] {
        [
            &self.page_param,
            &self.limit_param,
            &self.cursor_param,
            &self.sort_param,
        ]
    }
}

/// A validated request: filter, normalized sort, and window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub filter: FilterSpec,
    pub sort: SortSpec,
    pub window: PageWindow,
}

impl PageRequest {
    /// Splits `params` into pagination and filter parameters and runs the
    /// three builders. For repeated pagination parameters the first
    /// occurrence wins.
    ///
    /// # Errors
    ///
    /// Propagates the first [`QueryError`] from the filter, sort, or window
    /// builder, in that order. A cursor whose values do not fit the schema
    /// types is [`QueryError::InvalidCursor`].
    pub fn parse<I, K, V>(params: I, schema: &Schema, config: &QueryConfig) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params: Vec<(K, V)> = params.into_iter().collect();
        let first = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k.as_ref() == name)
                .map(|(_, v)| v.as_ref())
        };

        let filter = FilterBuilder::new(schema)
            .policy(config.unknown_fields)
            .reserved(config.reserved())
            .build(params.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))?;

        let sort = match first(&config.sort_param) {
            Some(raw) => SortSpec::build(raw, schema)?,
            None => SortSpec::build(SortInput::default(), schema)?,
        };

        let window = PageWindow::build(
            first(&config.page_param),
            first(&config.limit_param),
            first(&config.cursor_param),
            &config.window,
        )?;
        if let PageWindow::Cursor { after, .. } = &window {
            after.check_types(schema)?;
        }

        Ok(Self {
            filter,
            sort,
            window,
        })
    }

    /// The plan the executor would run for this request.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidCursor`] when the cursor does not fit the sort.
    pub fn plan(&self) -> Result<QueryPlan, QueryError> {
        QueryPlan::new(&self.filter, &self.sort, &self.window)
    }
}
