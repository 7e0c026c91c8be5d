//! Opaque cursor tokens and the keyset bound derived from them.
//!
//! A token is URL-safe base64 (no padding) over the compact JSON
//! `{"s": [sort fields], "v": [values]}`, directions included. The same key
//! always encodes to the same token, and decoding an encoded key yields the
//! key back unchanged.

use std::cmp::Ordering;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::schema::Schema;
use crate::sort::{SortField, SortSpec};
use crate::traits::FieldAccess;
use crate::types::FieldValue;

// ---------------------------------------------------------------------------
// CursorKey
// ---------------------------------------------------------------------------

/// Sort-key tuple of a single record: the sort order it was taken under and
/// the record's value for each sort field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorKey {
    #[serde(rename = "s")]
    sort: Vec<SortField>,
    #[serde(rename = "v")]
    values: Vec<FieldValue>,
}

impl CursorKey {
    /// Pairs sort fields with values.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidCursor`] when the two lists differ in
    /// length or are empty.
    pub fn new(sort: Vec<SortField>, values: Vec<FieldValue>) -> Result<Self, QueryError> {
        if sort.is_empty() {
            return Err(QueryError::invalid_cursor("cursor carries no sort key"));
        }
        if sort.len() != values.len() {
            return Err(QueryError::invalid_cursor(format!(
                "cursor names {} fields but carries {} values",
                sort.len(),
                values.len()
            )));
        }
        Ok(Self { sort, values })
    }

    /// Extracts the key of `item` under `sort`. Missing fields become `Null`.
    pub fn from_item<T: FieldAccess + ?Sized>(sort: &SortSpec, item: &T) -> Self {
        let values = sort
            .field_names()
            .map(|name| item.field(name).unwrap_or(FieldValue::Null))
            .collect();
        Self {
            sort: sort.fields().to_vec(),
            values,
        }
    }

    /// The sort order the key was taken under.
    #[must_use]
    pub fn sort(&self) -> &[SortField] {
        &self.sort
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.sort.iter().map(|f| f.field.as_str())
    }

    #[must_use]
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// Whether this key was taken under the same fields and directions as `sort`.
    #[must_use]
    pub fn matches_sort(&self, sort: &SortSpec) -> bool {
        self.sort == sort.fields()
    }

    /// Compact rendering of the issuing sort order, e.g. `-price,id`.
    #[must_use]
    pub fn sort_compact(&self) -> String {
        SortSpec::compact(&self.sort)
    }

    /// Checks every value against the declared type of its field. `Null` is
    /// accepted for any field.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidCursor`] when a field is not allow-listed
    /// or a value is of the wrong kind.
    pub fn check_types(&self, schema: &Schema) -> Result<(), QueryError> {
        for (sort_field, value) in self.sort.iter().zip(&self.values) {
            let descriptor = schema.field(&sort_field.field).ok_or_else(|| {
                QueryError::invalid_cursor(format!(
                    "cursor names unknown field `{}`",
                    sort_field.field
                ))
            })?;
            if !descriptor.field_type.admits(value) {
                return Err(QueryError::invalid_cursor(format!(
                    "cursor value for `{}` is not a {}",
                    sort_field.field,
                    descriptor.field_type.as_str()
                )));
            }
        }
        Ok(())
    }

    /// Encodes the key as an opaque token.
    #[must_use]
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("cursor key serializes to JSON");
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decodes a token produced by [`CursorKey::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidCursor`] for bad base64, bad JSON, or a
    /// key whose fields and values do not line up.
    pub fn decode(token: &str) -> Result<Self, QueryError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| QueryError::invalid_cursor(format!("not base64: {e}")))?;
        let raw: CursorKey = serde_json::from_slice(&bytes)
            .map_err(|e| QueryError::invalid_cursor(format!("malformed payload: {e}")))?;
        Self::new(raw.sort, raw.values)
    }
}

// ---------------------------------------------------------------------------
// SeekBound
// ---------------------------------------------------------------------------

/// Keyset predicate admitting only records strictly after a cursor key in a
/// given sort order.
///
/// Comparison is lexicographic over all sort fields, each in its own
/// direction. Because the order ends with the unique tie-break, no two
/// records share a position and continuation never skips or repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeekBound {
    sort: SortSpec,
    after: Vec<FieldValue>,
}

impl SeekBound {
    /// Bound for records following `key` under `sort`.
    #[must_use]
    pub fn after(sort: &SortSpec, key: &CursorKey) -> Self {
        Self {
            sort: sort.clone(),
            after: key.values.clone(),
        }
    }

    #[must_use]
    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    /// Key values the bound starts after, in sort order.
    #[must_use]
    pub fn key(&self) -> &[FieldValue] {
        &self.after
    }

    /// Whether `item` sorts strictly after the bound.
    pub fn admits<T: FieldAccess + ?Sized>(&self, item: &T) -> bool {
        self.sort.compare_to_key(item, &self.after) == Ordering::Greater
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
