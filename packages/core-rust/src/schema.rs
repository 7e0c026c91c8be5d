//! Allow-list schema: which fields a caller may filter and sort on.
//!
//! A [`Schema`] is an explicit value passed into every builder call. There is
//! no global registry, so two routes with different allow-lists never share
//! hidden state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sort::SortDirection;
use crate::types::FieldType;

/// Filter operators a field may permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Range,
    In,
    Contains,
}

impl Operator {
    /// Operator name as it appears in bracket parameters (`field[in]`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Range => "range",
            Operator::In => "in",
            Operator::Contains => "contains",
        }
    }
}

/// Single allow-listed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Name of the field as it appears in records and request parameters.
    pub name: String,
    /// Value type used to parse raw parameters.
    #[serde(flatten)]
    pub field_type: FieldType,
    /// Operators callers may apply. Defaults depend on the type.
    #[serde(default)]
    pub operators: Vec<Operator>,
    /// Whether the field may appear in a sort order.
    #[serde(default = "default_sortable")]
    pub sortable: bool,
}

fn default_sortable() -> bool {
    true
}

impl FieldDescriptor {
    /// Creates a descriptor with the default operator set for its type:
    /// strings get `eq`/`in`/`contains`, numbers and dates `eq`/`range`/`in`,
    /// enums `eq`/`in`.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let operators = default_operators(&field_type);
        Self {
            name: name.into(),
            field_type,
            operators,
            sortable: true,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Date)
    }

    pub fn enumeration<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            FieldType::Enum {
                variants: variants.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Replaces the permitted operator set.
    #[must_use]
    pub fn operators(mut self, operators: impl IntoIterator<Item = Operator>) -> Self {
        self.operators = operators.into_iter().collect();
        self
    }

    /// Excludes the field from sort orders.
    #[must_use]
    pub fn unsortable(mut self) -> Self {
        self.sortable = false;
        self
    }

    /// Whether `op` may be applied to this field.
    #[must_use]
    pub fn permits(&self, op: Operator) -> bool {
        self.operators.contains(&op)
    }
}

fn default_operators(field_type: &FieldType) -> Vec<Operator> {
    match field_type {
        FieldType::String => vec![Operator::Eq, Operator::In, Operator::Contains],
        FieldType::Number | FieldType::Date => vec![Operator::Eq, Operator::Range, Operator::In],
        FieldType::Enum { .. } => vec![Operator::Eq, Operator::In],
    }
}

/// The field appended to every sort order to make it deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieBreak {
    /// A field whose values are unique across the collection.
    pub field: String,
    /// Direction used when the tie-break is appended automatically.
    pub direction: SortDirection,
}

/// Errors from constructing a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),
    #[error("tie-break field `{0}` is not in the allow-list")]
    MissingTieBreak(String),
    #[error("tie-break field `{0}` must be sortable")]
    UnsortableTieBreak(String),
    #[error("enum field `{0}` declares no variants")]
    EmptyEnum(String),
    #[error("operator `{op}` is not supported on {field_type} field `{field}`")]
    UnsupportedOperator {
        field: String,
        field_type: &'static str,
        op: &'static str,
    },
}

/// The allow-list: every field callers may reference, plus the tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDef", into = "SchemaDef")]
pub struct Schema {
    fields: BTreeMap<String, FieldDescriptor>,
    tie_break: TieBreak,
}

impl Schema {
    /// Builds a schema whose tie-break sorts ascending.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] for duplicate names, an enum without variants,
    /// `contains` on a non-text field, or a tie-break field that is missing
    /// or unsortable.
    pub fn new(
        fields: impl IntoIterator<Item = FieldDescriptor>,
        tie_break: impl Into<String>,
    ) -> Result<Self, SchemaError> {
        let mut table = BTreeMap::new();
        for descriptor in fields {
            validate_descriptor(&descriptor)?;
            if table.contains_key(&descriptor.name) {
                return Err(SchemaError::DuplicateField(descriptor.name));
            }
            table.insert(descriptor.name.clone(), descriptor);
        }

        let tie_break = tie_break.into();
        match table.get(&tie_break) {
            None => return Err(SchemaError::MissingTieBreak(tie_break)),
            Some(d) if !d.sortable => return Err(SchemaError::UnsortableTieBreak(tie_break)),
            Some(_) => {}
        }

        Ok(Self {
            fields: table,
            tie_break: TieBreak {
                field: tie_break,
                direction: SortDirection::Asc,
            },
        })
    }

    /// Overrides the direction the tie-break is appended with.
    #[must_use]
    pub fn tie_break_direction(mut self, direction: SortDirection) -> Self {
        self.tie_break.direction = direction;
        self
    }

    /// Looks up an allow-listed field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    /// Whether `name` is allow-listed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    #[must_use]
    pub fn tie_break(&self) -> &TieBreak {
        &self.tie_break
    }

    /// All descriptors in name order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }
}

fn validate_descriptor(descriptor: &FieldDescriptor) -> Result<(), SchemaError> {
    if let FieldType::Enum { variants } = &descriptor.field_type {
        if variants.is_empty() {
            return Err(SchemaError::EmptyEnum(descriptor.name.clone()));
        }
    }
    if descriptor.permits(Operator::Contains) && !descriptor.field_type.is_textual() {
        return Err(SchemaError::UnsupportedOperator {
            field: descriptor.name.clone(),
            field_type: descriptor.field_type.as_str(),
            op: Operator::Contains.as_str(),
        });
    }
    Ok(())
}

/// Serialized shape of a [`Schema`], validated on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaDef {
    fields: Vec<FieldDescriptor>,
    tie_break: String,
    #[serde(default)]
    tie_break_direction: SortDirection,
}

impl TryFrom<SchemaDef> for Schema {
    type Error = SchemaError;

    fn try_from(def: SchemaDef) -> Result<Self, Self::Error> {
        let fields = def.fields.into_iter().map(|mut d| {
            if d.operators.is_empty() {
                d.operators = default_operators(&d.field_type);
            }
            d
        });
        Ok(Schema::new(fields, def.tie_break)?.tie_break_direction(def.tie_break_direction))
    }
}

impl From<Schema> for SchemaDef {
    fn from(schema: Schema) -> Self {
        Self {
            fields: schema.fields.into_values().collect(),
            tie_break: schema.tie_break.field,
            tie_break_direction: schema.tie_break.direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn products() -> Schema {
        Schema::new(
            [
                FieldDescriptor::string("id"),
                FieldDescriptor::string("name"),
                FieldDescriptor::number("price"),
                FieldDescriptor::enumeration("status", ["active", "archived"]),
            ],
            "id",
        )
        .unwrap()
    }

    #[test]
    fn default_operators_follow_type() {
        let schema = products();
        let price = schema.field("price").unwrap();
        assert!(price.permits(Operator::Range));
        assert!(!price.permits(Operator::Contains));
        let status = schema.field("status").unwrap();
        assert!(status.permits(Operator::Eq));
        assert!(!status.permits(Operator::Range));
    }

    #[test]
    fn tie_break_must_be_allow_listed_and_sortable() {
        let missing = Schema::new([FieldDescriptor::string("name")], "id");
        assert_eq!(missing, Err(SchemaError::MissingTieBreak("id".into())));

        let unsortable = Schema::new([FieldDescriptor::string("id").unsortable()], "id");
        assert_eq!(unsortable, Err(SchemaError::UnsortableTieBreak("id".into())));
    }

    #[test]
    fn rejects_duplicates_and_bad_operators() {
        let dup = Schema::new(
            [FieldDescriptor::string("id"), FieldDescriptor::number("id")],
            "id",
        );
        assert_eq!(dup, Err(SchemaError::DuplicateField("id".into())));

        let contains_on_number = Schema::new(
            [
                FieldDescriptor::string("id"),
                FieldDescriptor::number("price").operators([Operator::Contains]),
            ],
            "id",
        );
        assert!(matches!(
            contains_on_number,
            Err(SchemaError::UnsupportedOperator { .. })
        ));

        let empty_enum = Schema::new(
            [
                FieldDescriptor::string("id"),
                FieldDescriptor::enumeration("status", Vec::<String>::new()),
            ],
            "id",
        );
        assert_eq!(empty_enum, Err(SchemaError::EmptyEnum("status".into())));
    }

    #[test]
    fn deserializes_with_validation() {
        let json = serde_json::json!({
            "fields": [
                { "name": "id", "type": "string" },
                { "name": "createdAt", "type": "date" },
                { "name": "status", "type": "enum", "variants": ["active"] }
            ],
            "tieBreak": "id",
            "tieBreakDirection": "desc"
        });
        let schema: Schema = serde_json::from_value(json).unwrap();
        assert!(schema.field("createdAt").unwrap().permits(Operator::Range));
        assert_eq!(schema.tie_break().direction, SortDirection::Desc);

        let bad = serde_json::json!({ "fields": [], "tieBreak": "id" });
        assert!(serde_json::from_value::<Schema>(bad).is_err());
    }
}
