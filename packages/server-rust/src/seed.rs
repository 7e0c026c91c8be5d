//! Demo data: a built-in product catalog, or a schema and documents loaded
//! from JSON files.

use std::path::Path;

use anyhow::Context;
use folio_core::{Document, FieldDescriptor, Operator, Schema};
use serde_json::json;

const CATEGORIES: [&str; 4] = ["books", "games", "music", "tools"];
const ADJECTIVES: [&str; 6] = ["Blue", "Quiet", "Rapid", "Golden", "Tiny", "Vintage"];
const NOUNS: [&str; 7] = ["Lamp", "Atlas", "Kettle", "Guitar", "Puzzle", "Wrench", "Novel"];

/// Allow-list of the built-in catalog, tie-broken by `id`.
///
/// `name` supports substring search, `price` and `createdAt` ranges,
/// `category` exact and `in` matching. `description` is filterable by
/// substring but never sortable.
///
/// # Errors
///
/// Returns an error if the catalog descriptors do not form a valid schema.
pub fn sample_schema() -> anyhow::Result<Schema> {
    Schema::new(
        [
            FieldDescriptor::string("id").operators([Operator::Eq, Operator::In]),
            FieldDescriptor::string("name"),
            FieldDescriptor::string("description")
                .operators([Operator::Contains])
                .unsortable(),
            FieldDescriptor::enumeration("category", CATEGORIES),
            FieldDescriptor::number("price"),
            FieldDescriptor::date("createdAt"),
        ],
        "id",
    )
    .context("built-in catalog schema")
}

/// Forty products with repeating prices and categories, so sorts on either
/// rely on the tie-break.
///
/// # Errors
///
/// Returns an error if `schema` does not accept the catalog fields.
#[allow(clippy::cast_precision_loss)]
pub fn sample_documents(schema: &Schema) -> anyhow::Result<Vec<Document>> {
    (0..40_usize)
        .map(|i| {
            let name = format!(
                "{} {}",
                ADJECTIVES[i % ADJECTIVES.len()],
                NOUNS[i % NOUNS.len()]
            );
            let value = json!({
                "id": format!("p{:03}", i + 1),
                "name": name,
                "description": format!("{name}, catalog item {}", i + 1),
                "category": CATEGORIES[i % CATEGORIES.len()],
                "price": 5.0 + 2.5 * ((i * 7) % 16) as f64,
                "createdAt": format!("2024-{:02}-{:02}", i % 12 + 1, i % 28 + 1),
                "stock": (i * 13) % 50,
            });
            Document::from_json(&value, schema).with_context(|| format!("catalog row {i}"))
        })
        .collect()
}

/// Reads a schema definition.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not describe a
/// valid schema.
pub fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading schema {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing schema {}", path.display()))
}

/// Reads a JSON array of documents and types them against `schema`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not a JSON array, or any
/// element fails [`Document::from_json`]. The failing index is reported.
pub fn load_documents(path: &Path, schema: &Schema) -> anyhow::Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading documents {}", path.display()))?;
    let values: Vec<serde_json::Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} must hold a JSON array", path.display()))?;
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            Document::from_json(value, schema)
                .with_context(|| format!("document {i} in {}", path.display()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use folio_core::{FieldValue, SortSpec};

    use super::*;

    #[test]
    fn catalog_conforms_to_schema() {
        let schema = sample_schema().unwrap();
        let docs = sample_documents(&schema).unwrap();
        assert_eq!(docs.len(), 40);
        assert_eq!(docs[0].get("id"), Some(&FieldValue::string("p001")));
        assert!(docs.iter().all(|d| d.get("createdAt").is_some()));
        assert_eq!(docs[0].to_json()["stock"], 0);
        assert!(SortSpec::build("-description", &schema).is_err());
    }

    #[test]
    fn loads_schema_and_documents_from_files() {
        let mut schema_file = tempfile::NamedTempFile::new().unwrap();
        write!(
            schema_file,
            r#"{{
                "fields": [
                    {{ "name": "sku", "type": "string" }},
                    {{ "name": "qty", "type": "number" }}
                ],
                "tieBreak": "sku"
            }}"#
        )
        .unwrap();
        let mut docs_file = tempfile::NamedTempFile::new().unwrap();
        write!(
            docs_file,
            r#"[{{ "sku": "a", "qty": 1 }}, {{ "sku": "b", "qty": 2, "note": "x" }}]"#
        )
        .unwrap();

        let schema = load_schema(schema_file.path()).unwrap();
        assert_eq!(schema.tie_break().field, "sku");
        let docs = load_documents(docs_file.path(), &schema).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].get("qty"), Some(&FieldValue::number(2.0)));
    }

    #[test]
    fn keyless_document_reports_its_index() {
        let schema = sample_schema().unwrap();
        let mut docs_file = tempfile::NamedTempFile::new().unwrap();
        write!(docs_file, r#"[{{ "id": "p1" }}, {{ "name": "orphan" }}]"#).unwrap();

        let err = load_documents(docs_file.path(), &schema).unwrap_err();
        assert!(format!("{err:#}").contains("document 1"));
        assert!(format!("{err:#}").contains("tie-break"));
    }
}
