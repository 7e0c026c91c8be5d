use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::types::FieldValue;

/// Read access to the named fields of a record.
///
/// Filters, sort orders, and cursor keys evaluate records only through this
/// trait, which keeps them independent of how a data source represents rows.
pub trait FieldAccess {
    /// Returns the value of `name`, or `None` when the record has no such field.
    fn field(&self, name: &str) -> Option<FieldValue>;
}

impl FieldAccess for BTreeMap<String, FieldValue> {
    fn field(&self, name: &str) -> Option<FieldValue> {
        self.get(name).cloned()
    }
}

impl FieldAccess for HashMap<String, FieldValue> {
    fn field(&self, name: &str) -> Option<FieldValue> {
        self.get(name).cloned()
    }
}

impl<T: FieldAccess + ?Sized> FieldAccess for &T {
    fn field(&self, name: &str) -> Option<FieldValue> {
        (**self).field(name)
    }
}

impl<T: FieldAccess + ?Sized> FieldAccess for std::sync::Arc<T> {
    fn field(&self, name: &str) -> Option<FieldValue> {
        (**self).field(name)
    }
}
