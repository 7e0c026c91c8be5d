//! Sort orders normalized against the allow-list.
//!
//! A [`SortSpec`] always ends with the schema's tie-break field, which makes
//! the order total over any collection where the tie-break is unique.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::schema::Schema;
use crate::traits::FieldAccess;
use crate::types::FieldValue;

/// Request parameter name reported in sort validation errors.
const SORT_PARAM: &str = "sort";

// ---------------------------------------------------------------------------
// SortDirection / SortField
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Orients an ascending comparison result.
    #[must_use]
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// One `(field, direction)` pair of a sort order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

impl From<&str> for SortField {
    fn from(field: &str) -> Self {
        Self::asc(field)
    }
}

// ---------------------------------------------------------------------------
// SortInput
// ---------------------------------------------------------------------------

/// Raw sort order as supplied by a caller.
///
/// Deserializes from either a compact string (`"-createdAt,name"`) or a list
/// of `{"field", "direction"}` objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortInput {
    Compact(String),
    Fields(Vec<SortField>),
}

impl Default for SortInput {
    fn default() -> Self {
        SortInput::Compact(String::new())
    }
}

impl From<&str> for SortInput {
    fn from(value: &str) -> Self {
        SortInput::Compact(value.to_string())
    }
}

impl From<Vec<SortField>> for SortInput {
    fn from(value: Vec<SortField>) -> Self {
        SortInput::Fields(value)
    }
}

fn parse_compact(raw: &str) -> Result<Vec<SortField>, QueryError> {
    let mut fields = Vec::new();
    for segment in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (direction, name) = if let Some(rest) = segment.strip_prefix('-') {
            (SortDirection::Desc, rest.trim_start())
        } else if let Some(rest) = segment.strip_prefix('+') {
            (SortDirection::Asc, rest.trim_start())
        } else {
            (SortDirection::Asc, segment)
        };
        if name.is_empty() {
            return Err(QueryError::validation(
                SORT_PARAM,
                format!("segment `{segment}` names no field"),
            ));
        }
        fields.push(SortField {
            field: name.to_string(),
            direction,
        });
    }
    Ok(fields)
}

// ---------------------------------------------------------------------------
// SortSpec
// ---------------------------------------------------------------------------

/// Normalized sort order: allow-listed, sortable, duplicate-free, and ending
/// with the tie-break field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SortSpec {
    fields: Vec<SortField>,
}

impl SortSpec {
    /// Normalizes a raw sort order against `schema`.
    ///
    /// Duplicate fields keep their first occurrence. Fields after the
    /// tie-break are dropped because the tie-break alone already decides
    /// every remaining comparison; without it, the tie-break is appended in
    /// the schema's direction.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Validation`] when a field is not allow-listed,
    /// not sortable, or a compact segment names no field.
    pub fn build(input: impl Into<SortInput>, schema: &Schema) -> Result<Self, QueryError> {
        let requested = match input.into() {
            SortInput::Compact(raw) => parse_compact(&raw)?,
            SortInput::Fields(fields) => fields,
        };

        let tie_break = schema.tie_break();
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(requested.len() + 1);
        let mut terminated = false;

        for sort_field in requested {
            match schema.field(&sort_field.field) {
                None => {
                    return Err(QueryError::validation(
                        sort_field.field,
                        "not in allow-list",
                    ))
                }
                Some(descriptor) if !descriptor.sortable => {
                    return Err(QueryError::validation(sort_field.field, "not sortable"))
                }
                Some(_) => {}
            }
            if terminated || !seen.insert(sort_field.field.clone()) {
                continue;
            }
            terminated = sort_field.field == tie_break.field;
            fields.push(sort_field);
        }

        if !terminated {
            fields.push(SortField {
                field: tie_break.field.clone(),
                direction: tie_break.direction,
            });
        }

        let spec = Self { fields };
        tracing::debug!(sort = %spec.to_compact(), "sort order normalized");
        Ok(spec)
    }

    /// The order consisting of the tie-break alone.
    #[must_use]
    pub fn tie_break_only(schema: &Schema) -> Self {
        let tie_break = schema.tie_break();
        Self {
            fields: vec![SortField {
                field: tie_break.field.clone(),
                direction: tie_break.direction,
            }],
        }
    }

    #[must_use]
    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    /// Caller-chosen fields, i.e. everything before the tie-break.
    #[must_use]
    pub fn leading(&self) -> &[SortField] {
        &self.fields[..self.fields.len() - 1]
    }

    /// The final, unique field of the order.
    #[must_use]
    pub fn tie_break(&self) -> &SortField {
        self.fields
            .last()
            .expect("a sort spec always holds the tie-break field")
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.field.as_str())
    }

    /// Total order over two records. Missing fields compare as `Null`.
    pub fn compare<A, B>(&self, a: &A, b: &B) -> Ordering
    where
        A: FieldAccess + ?Sized,
        B: FieldAccess + ?Sized,
    {
        for sort_field in &self.fields {
            let left = a.field(&sort_field.field).unwrap_or(FieldValue::Null);
            let right = b.field(&sort_field.field).unwrap_or(FieldValue::Null);
            let ordering = sort_field.direction.apply(left.cmp(&right));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Compares a record against a bare key tuple laid out in sort order.
    ///
    /// Extra trailing fields on either side are ignored.
    pub fn compare_to_key<A>(&self, item: &A, key: &[FieldValue]) -> Ordering
    where
        A: FieldAccess + ?Sized,
    {
        for (sort_field, bound) in self.fields.iter().zip(key) {
            let value = item.field(&sort_field.field).unwrap_or(FieldValue::Null);
            let ordering = sort_field.direction.apply(value.cmp(bound));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Canonical compact form, e.g. `-createdAt,id`.
    #[must_use]
    pub fn to_compact(&self) -> String {
        Self::compact(&self.fields)
    }

    /// Compact form of any field list.
    #[must_use]
    pub fn compact(fields: &[SortField]) -> String {
        fields
            .iter()
            .map(|f| match f.direction {
                SortDirection::Asc => f.field.clone(),
                SortDirection::Desc => format!("-{}", f.field),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl std::fmt::Display for SortSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_compact())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
