//! Page windows: which slice of the ordered result a request asks for.

use std::num::IntErrorKind;

use serde::{Deserialize, Serialize};

use crate::cursor::CursorKey;
use crate::error::QueryError;
use crate::sort::SortSpec;

/// Page size bounds applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WindowConfig {
    /// Upper bound for `limit`. Larger requests are clamped, not rejected.
    pub max_page_size: u32,
    /// Page size used when the request carries no `limit`.
    pub default_page_size: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            default_page_size: 20,
        }
    }
}

impl WindowConfig {
    /// The default page size, clamped into `[1, max_page_size]`.
    #[must_use]
    pub fn effective_default(&self) -> u32 {
        self.default_page_size.clamp(1, self.max_page_size.max(1))
    }
}

/// Clamps a requested page size into `[1, max]`.
#[must_use]
pub fn clamp_page_size(requested: i64, max: u32) -> u32 {
    let max = max.max(1);
    let clamped = requested.clamp(1, i64::from(max));
    u32::try_from(clamped).unwrap_or(max)
}

/// Parses an integer parameter. Out-of-range values saturate so that huge
/// limits clamp instead of failing.
fn parse_integer(param: &str, raw: &str) -> Result<i64, QueryError> {
    raw.trim().parse::<i64>().or_else(|e| match e.kind() {
        IntErrorKind::PosOverflow => Ok(i64::MAX),
        IntErrorKind::NegOverflow => Ok(i64::MIN),
        _ => Err(QueryError::validation(
            param,
            format!("expected an integer, got `{raw}`"),
        )),
    })
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Offset or cursor window. The two modes are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PageWindow {
    #[serde(rename_all = "camelCase")]
    Offset { page: u64, page_size: u32 },
    #[serde(rename_all = "camelCase")]
    Cursor { after: CursorKey, page_size: u32 },
}

impl PageWindow {
    /// Builds a window from raw request text.
    ///
    /// A non-empty cursor selects cursor mode and `page` is then ignored.
    /// Missing values fall back to page 1 and the configured default size;
    /// pages below 1 become 1 and sizes outside `[1, max]` are clamped.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Validation`] when `page` or `limit` is not an
    /// integer, and [`QueryError::InvalidCursor`] when the cursor does not
    /// decode.
    pub fn build(
        raw_page: Option<&str>,
        raw_limit: Option<&str>,
        raw_cursor: Option<&str>,
        config: &WindowConfig,
    ) -> Result<Self, QueryError> {
        let page_size = match present(raw_limit) {
            Some(raw) => clamp_page_size(parse_integer("limit", raw)?, config.max_page_size),
            None => config.effective_default(),
        };

        if let Some(token) = present(raw_cursor) {
            let after = CursorKey::decode(token)?;
            return Ok(Self::Cursor { after, page_size });
        }

        let page = match present(raw_page) {
            Some(raw) => parse_integer("page", raw)?.max(1).unsigned_abs(),
            None => 1,
        };
        Ok(Self::Offset { page, page_size })
    }

    /// Offset window; `page` is raised to 1 and `page_size` clamped.
    #[must_use]
    pub fn offset(page: u64, page_size: u32, config: &WindowConfig) -> Self {
        Self::Offset {
            page: page.max(1),
            page_size: clamp_page_size(i64::from(page_size), config.max_page_size),
        }
    }

    /// Cursor window continuing after `after`; `page_size` is clamped.
    #[must_use]
    pub fn cursor(after: CursorKey, page_size: u32, config: &WindowConfig) -> Self {
        Self::Cursor {
            after,
            page_size: clamp_page_size(i64::from(page_size), config.max_page_size),
        }
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        match self {
            Self::Offset { page_size, .. } | Self::Cursor { page_size, .. } => *page_size,
        }
    }

    /// Page number in offset mode.
    #[must_use]
    pub fn page(&self) -> Option<u64> {
        match self {
            Self::Offset { page, .. } => Some(*page),
            Self::Cursor { .. } => None,
        }
    }

    #[must_use]
    pub fn is_cursor(&self) -> bool {
        matches!(self, Self::Cursor { .. })
    }

    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Offset { .. } => "offset",
            Self::Cursor { .. } => "cursor",
        }
    }

    /// Rows to skip: `(page - 1) * page_size` for offset windows, 0 for cursors.
    #[must_use]
    pub fn skip(&self) -> u64 {
        match self {
            Self::Offset { page, page_size } => {
                page.saturating_sub(1).saturating_mul(u64::from(*page_size))
            }
            Self::Cursor { .. } => 0,
        }
    }

    /// Rows to fetch. Cursor windows fetch one extra row beyond the page to
    /// learn whether another page follows.
    #[must_use]
    pub fn fetch_limit(&self) -> u64 {
        match self {
            Self::Offset { page_size, .. } => u64::from(*page_size),
            Self::Cursor { page_size, .. } => u64::from(*page_size) + 1,
        }
    }

    /// Verifies a cursor was issued for the same sort fields and directions
    /// as `sort`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidCursor`] on mismatch. Offset windows
    /// always pass.
    pub fn check_cursor_shape(&self, sort: &SortSpec) -> Result<(), QueryError> {
        match self {
            Self::Cursor { after, .. } if !after.matches_sort(sort) => {
                Err(QueryError::invalid_cursor(format!(
                    "cursor was issued for sort `{}`, request sorts by `{}`",
                    after.sort_compact(),
                    sort.to_compact()
                )))
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use super::*;
    use crate::schema::{FieldDescriptor, Schema};
    use crate::types::FieldValue;

    fn config() -> WindowConfig {
        WindowConfig::default()
    }

    #[test]
    fn offset_skip_is_page_times_size() {
        let window = PageWindow::build(Some("3"), Some("10"), None, &config()).unwrap();
        assert_eq!(
            window,
            PageWindow::Offset {
                page: 3,
                page_size: 10
            }
        );
        assert_eq!(window.skip(), 20);
        assert_eq!(window.fetch_limit(), 10);
    }

    #[test]
    fn oversized_limit_clamps_to_max() {
        let window = PageWindow::build(Some("1"), Some("500"), None, &config()).unwrap();
        assert_eq!(window.page_size(), 100);

        let huge = PageWindow::build(None, Some("99999999999999999999999"), None, &config());
        assert_eq!(huge.unwrap().page_size(), 100);
    }

    #[test]
    fn defaults_apply_when_absent() {
        let window = PageWindow::build(None, None, None, &config()).unwrap();
        assert_eq!(window.page(), Some(1));
        assert_eq!(window.page_size(), 20);

        let blank = PageWindow::build(Some(" "), Some(""), Some(""), &config()).unwrap();
        assert_eq!(blank, window);
    }

    #[test]
    fn low_values_are_raised() {
        let window = PageWindow::build(Some("0"), Some("-4"), None, &config()).unwrap();
        assert_eq!(window.page(), Some(1));
        assert_eq!(window.page_size(), 1);
        assert_eq!(window.skip(), 0);
    }

    #[test]
    fn non_numeric_values_fail_validation() {
        let err = PageWindow::build(Some("two"), None, None, &config()).unwrap_err();
        assert_eq!(err.field(), Some("page"));
        let err = PageWindow::build(None, Some("1.5"), None, &config()).unwrap_err();
        assert_eq!(err.field(), Some("limit"));
    }

    #[test]
    fn cursor_takes_precedence_over_page() {
        let key = CursorKey::new(vec!["id".into()], vec![FieldValue::string("k")]).unwrap();
        let window =
            PageWindow::build(Some("7"), Some("5"), Some(key.encode().as_str()), &config()).unwrap();
        assert!(window.is_cursor());
        assert_eq!(window.page(), None);
        assert_eq!(window.skip(), 0);
        assert_eq!(window.fetch_limit(), 6);

        let err = PageWindow::build(None, None, Some("%%%"), &config()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidCursor { .. }));
    }

    #[test]
    fn misconfigured_default_is_clamped() {
        let config = WindowConfig {
            max_page_size: 10,
            default_page_size: 50,
        };
        assert_eq!(config.effective_default(), 10);
        let config = WindowConfig {
            max_page_size: 10,
            default_page_size: 0,
        };
        assert_eq!(config.effective_default(), 1);
    }

    #[test]
    fn cursor_shape_must_match_sort() {
        let schema = Schema::new(
            [FieldDescriptor::string("id"), FieldDescriptor::number("price")],
            "id",
        )
        .unwrap();
        let by_price = SortSpec::build("price", &schema).unwrap();
        let by_id = SortSpec::build("", &schema).unwrap();
        let item = BTreeMap::from([
            ("id".to_string(), FieldValue::string("a")),
            ("price".to_string(), FieldValue::number(1.0)),
        ]);
        let window = PageWindow::cursor(CursorKey::from_item(&by_price, &item), 10, &config());

        assert!(window.check_cursor_shape(&by_price).is_ok());
        let err = window.check_cursor_shape(&by_id).unwrap_err();
        assert!(matches!(err, QueryError::InvalidCursor { .. }));
        assert!(err.to_string().contains("`price,id`"));

        let reversed = SortSpec::build("-price", &schema).unwrap();
        let err = window.check_cursor_shape(&reversed).unwrap_err();
        assert!(matches!(err, QueryError::InvalidCursor { .. }));
        assert!(err.to_string().contains("request sorts by `-price,id`"));

        assert!(PageWindow::offset(1, 10, &config())
            .check_cursor_shape(&by_id)
            .is_ok());
    }

    proptest! {
        #[test]
        fn page_size_always_within_bounds(limit in any::<i64>(), max in 1u32..1000) {
            let config = WindowConfig { max_page_size: max, default_page_size: 20 };
            let raw = limit.to_string();
            let window = PageWindow::build(None, Some(raw.as_str()), None, &config).unwrap();
            prop_assert!(window.page_size() >= 1 && window.page_size() <= max);
            if limit > i64::from(max) {
                prop_assert_eq!(window.page_size(), max);
            }
        }

        #[test]
        fn clamping_is_idempotent(limit in any::<i64>(), max in 1u32..1000) {
            let once = clamp_page_size(limit, max);
            prop_assert_eq!(clamp_page_size(i64::from(once), max), once);
        }
    }
}
