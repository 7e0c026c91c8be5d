//! Folio Core: allow-list schemas, filter/sort/page builders, cursor codec, and result envelopes.

pub mod cursor;
pub mod document;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod plan;
pub mod request;
pub mod schema;
pub mod sort;
pub mod traits;
pub mod types;
pub mod window;

pub use cursor::{CursorKey, SeekBound};
pub use document::{Document, DocumentError};
pub use envelope::{total_pages, PageMeta, ResultEnvelope};
pub use error::QueryError;
pub use filter::{FilterBuilder, FilterSpec, Predicate, UnknownFieldPolicy};
pub use plan::QueryPlan;
pub use request::{PageRequest, QueryConfig};
pub use schema::{FieldDescriptor, Operator, Schema, SchemaError, TieBreak};
pub use sort::{SortDirection, SortField, SortInput, SortSpec};
pub use traits::FieldAccess;
pub use types::{FieldType, FieldValue};
pub use window::{clamp_page_size, PageWindow, WindowConfig};
