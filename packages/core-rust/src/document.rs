//! A schema-typed record backed by a JSON object.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::schema::Schema;
use crate::traits::FieldAccess;
use crate::types::FieldValue;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("document must be a JSON object")]
    NotAnObject,
    #[error("field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("document lacks the tie-break field `{0}`")]
    MissingKey(String),
}

/// Generic record: allow-listed fields are held as typed [`FieldValue`]s,
/// everything else is carried through as raw JSON.
///
/// Serializes back to a single flat JSON object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    fields: BTreeMap<String, FieldValue>,
    extra: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    /// Types the allow-listed fields of `value` according to `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when `value` is not an object, an
    /// allow-listed field has the wrong shape, or the tie-break field is
    /// missing or null.
    pub fn from_json(value: &serde_json::Value, schema: &Schema) -> Result<Self, DocumentError> {
        let object = value.as_object().ok_or(DocumentError::NotAnObject)?;
        let mut document = Self::default();
        for (name, raw) in object {
            match schema.field(name) {
                Some(descriptor) => {
                    let typed = descriptor.field_type.from_json(raw).map_err(|reason| {
                        DocumentError::InvalidField {
                            field: name.clone(),
                            reason,
                        }
                    })?;
                    document.fields.insert(name.clone(), typed);
                }
                None => {
                    document.extra.insert(name.clone(), raw.clone());
                }
            }
        }

        let key = &schema.tie_break().field;
        if document.fields.get(key).map_or(true, FieldValue::is_null) {
            return Err(DocumentError::MissingKey(key.clone()));
        }
        Ok(document)
    }

    /// Inserts or replaces a typed field.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Number of keys in the rendered object. Typed fields shadow extras of
    /// the same name.
    #[must_use]
    pub fn len(&self) -> usize {
        let shadowed = self
            .extra
            .keys()
            .filter(|name| self.fields.contains_key(*name))
            .count();
        self.fields.len() + self.extra.len() - shadowed
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.extra.is_empty()
    }

    /// Renders the document as a flat JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = self.extra.clone();
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.to_json());
        }
        serde_json::Value::Object(object)
    }
}

impl FieldAccess for Document {
    fn field(&self, name: &str) -> Option<FieldValue> {
        self.fields.get(name).cloned()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in &self.extra {
            if !self.fields.contains_key(name) {
                map.serialize_entry(name, value)?;
            }
        }
        for (name, value) in &self.fields {
            map.serialize_entry(name, &value.to_json())?;
        }
        map.end()
    }
}
