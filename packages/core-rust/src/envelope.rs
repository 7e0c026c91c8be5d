//! Result envelopes returned to callers: items plus pagination metadata.

use serde::{Deserialize, Serialize};

use crate::cursor::CursorKey;
use crate::sort::SortSpec;
use crate::traits::FieldAccess;

/// Pagination metadata, tagged by window mode.
///
/// ```json
/// {"mode": "offset", "page": 2, "pageSize": 20, "total": 45, "totalPages": 3,
///  "hasNext": true, "hasPrev": true, "nextCursor": "eyJmIjpb..."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PageMeta {
    #[serde(rename_all = "camelCase")]
    Offset {
        page: u64,
        page_size: u32,
        total: u64,
        total_pages: u64,
        has_next: bool,
        has_prev: bool,
        /// Cursor after the last item, for callers switching to cursor mode.
        next_cursor: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Cursor {
        page_size: u32,
        has_next: bool,
        next_cursor: Option<String>,
    },
}

impl PageMeta {
    #[must_use]
    pub fn has_next(&self) -> bool {
        match self {
            PageMeta::Offset { has_next, .. } | PageMeta::Cursor { has_next, .. } => *has_next,
        }
    }

    #[must_use]
    pub fn next_cursor(&self) -> Option<&str> {
        match self {
            PageMeta::Offset { next_cursor, .. } | PageMeta::Cursor { next_cursor, .. } => {
                next_cursor.as_deref()
            }
        }
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        match self {
            PageMeta::Offset { page_size, .. } | PageMeta::Cursor { page_size, .. } => *page_size,
        }
    }
}

/// A page of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope<T> {
    pub items: Vec<T>,
    pub pagination: PageMeta,
}

/// `ceil(total / page_size)`; zero when there is nothing to page.
#[must_use]
pub fn total_pages(total: u64, page_size: u32) -> u64 {
    total.div_ceil(u64::from(page_size.max(1)))
}

impl<T: FieldAccess> ResultEnvelope<T> {
    /// Assembles an offset page from fetched rows and the filter's total.
    #[must_use]
    pub fn from_offset_rows(
        items: Vec<T>,
        total: u64,
        page: u64,
        page_size: u32,
        sort: &SortSpec,
    ) -> Self {
        let has_next = page.saturating_mul(u64::from(page_size)) < total;
        let next_cursor = if has_next {
            items.last().map(|last| CursorKey::from_item(sort, last).encode())
        } else {
            None
        };
        Self {
            items,
            pagination: PageMeta::Offset {
                page,
                page_size,
                total,
                total_pages: total_pages(total, page_size),
                has_next,
                has_prev: page > 1,
                next_cursor,
            },
        }
    }

    /// Assembles a cursor page from up to `page_size + 1` fetched rows. A
    /// lookahead row beyond the page is dropped and signals `has_next`.
    #[must_use]
    pub fn from_cursor_rows(mut items: Vec<T>, page_size: u32, sort: &SortSpec) -> Self {
        let keep = usize::try_from(page_size).unwrap_or(usize::MAX);
        let has_next = items.len() > keep;
        items.truncate(keep);
        let next_cursor = if has_next {
            items.last().map(|last| CursorKey::from_item(sort, last).encode())
        } else {
            None
        };
        Self {
            items,
            pagination: PageMeta::Cursor {
                page_size,
                has_next,
                next_cursor,
            },
        }
    }
}

impl<T> ResultEnvelope<T> {
    /// Converts the items while keeping the metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ResultEnvelope<U> {
        ResultEnvelope {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::schema::{FieldDescriptor, Schema};
    use crate::types::FieldValue;

    type Row = BTreeMap<String, FieldValue>;

    fn sort() -> SortSpec {
        let schema = Schema::new(
            [FieldDescriptor::string("id"), FieldDescriptor::number("rank")],
            "id",
        )
        .unwrap();
        SortSpec::build("rank", &schema).unwrap()
    }

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| {
                BTreeMap::from([
                    ("id".to_string(), FieldValue::string(format!("r{i:02}"))),
                    ("rank".to_string(), FieldValue::from(i as i64)),
                ])
            })
            .collect()
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
    }

    #[test]
    fn offset_last_page_has_no_next() {
        let envelope = ResultEnvelope::from_offset_rows(rows(5), 25, 3, 10, &sort());
        assert!(!envelope.pagination.has_next());
        assert_eq!(envelope.pagination.next_cursor(), None);
        let PageMeta::Offset {
            total_pages,
            has_prev,
            ..
        } = envelope.pagination
        else {
            panic!("expected offset metadata");
        };
        assert_eq!(total_pages, 3);
        assert!(has_prev);
    }

    #[test]
    fn offset_middle_page_links_to_cursor() {
        let envelope = ResultEnvelope::from_offset_rows(rows(10), 25, 1, 10, &sort());
        assert!(envelope.pagination.has_next());
        let token = envelope.pagination.next_cursor().unwrap();
        let key = CursorKey::decode(token).unwrap();
        assert_eq!(key.values()[1], FieldValue::string("r09"));
    }

    #[test]
    fn cursor_lookahead_row_is_trimmed() {
        let envelope = ResultEnvelope::from_cursor_rows(rows(6), 5, &sort());
        assert_eq!(envelope.items.len(), 5);
        assert!(envelope.pagination.has_next());
        let key = CursorKey::decode(envelope.pagination.next_cursor().unwrap()).unwrap();
        assert_eq!(key.values(), &[FieldValue::number(4.0), FieldValue::string("r04")]);

        let last = ResultEnvelope::from_cursor_rows(rows(5), 5, &sort());
        assert!(!last.pagination.has_next());
        assert_eq!(last.pagination.next_cursor(), None);
    }

    #[test]
    fn serializes_in_camel_case_with_mode_tag() {
        let envelope = ResultEnvelope::from_cursor_rows(Vec::<Row>::new(), 5, &sort())
            .map(|_| serde_json::Value::Null);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "items": [],
                "pagination": {
                    "mode": "cursor",
                    "pageSize": 5,
                    "hasNext": false,
                    "nextCursor": null
                }
            })
        );
    }
}
