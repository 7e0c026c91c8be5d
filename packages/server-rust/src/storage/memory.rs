//! In-memory [`DataSourceAdapter`] backed by [`DashMap`].
//!
//! Rows are keyed by their tie-break value. Every fetch takes a snapshot,
//! filters and sorts it with the core semantics, then applies skip/limit,
//! which makes this adapter the reference behavior for other backends.

use async_trait::async_trait;
use dashmap::DashMap;
use folio_core::{FieldAccess, FieldValue, FilterSpec, Schema, SortSpec};

use super::AdapterError;
use crate::traits::DataSourceAdapter;

pub struct MemorySource<T> {
    key_field: String,
    rows: DashMap<FieldValue, T>,
}

impl<T> MemorySource<T>
where
    T: FieldAccess + Clone + Send + Sync + 'static,
{
    /// Creates an empty source keyed by `key_field`.
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            rows: DashMap::new(),
        }
    }

    /// Creates an empty source keyed by the schema's tie-break field.
    #[must_use]
    pub fn for_schema(schema: &Schema) -> Self {
        Self::new(schema.tie_break().field.clone())
    }

    #[must_use]
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Inserts a row, replacing any row with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::MissingKey`] when the row has no key value.
    pub fn insert(&self, row: T) -> Result<Option<T>, AdapterError> {
        let key = row
            .field(&self.key_field)
            .filter(|v| !v.is_null())
            .ok_or_else(|| AdapterError::MissingKey(self.key_field.clone()))?;
        Ok(self.rows.insert(key, row))
    }

    /// Inserts every row, stopping at the first one without a key.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::MissingKey`] for the first keyless row.
    pub fn extend(&self, rows: impl IntoIterator<Item = T>) -> Result<(), AdapterError> {
        for row in rows {
            self.insert(row)?;
        }
        Ok(())
    }

    pub fn remove(&self, key: &FieldValue) -> Option<T> {
        self.rows.remove(key).map(|(_, row)| row)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn matching(&self, filter: &FilterSpec) -> Vec<T> {
        self.rows
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[async_trait]
impl<T> DataSourceAdapter<T> for MemorySource<T>
where
    T: FieldAccess + Clone + Send + Sync + 'static,
{
    async fn fetch(
        &self,
        filter: &FilterSpec,
        sort: &SortSpec,
        skip: u64,
        limit: u64,
    ) -> anyhow::Result<Vec<T>> {
        let mut rows = self.matching(filter);
        rows.sort_by(|a, b| sort.compare(a, b));

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(skip).take(limit).collect())
    }

    async fn count(&self, filter: &FilterSpec) -> anyhow::Result<u64> {
        let unbounded = filter.without_seek();
        let count = self
            .rows
            .iter()
            .filter(|entry| unbounded.matches(entry.value()))
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }
}
