//! Filter predicates and the builder that derives them from raw parameters.
//!
//! Raw parameters follow the bracket convention common to query-string
//! parsers:
//!
//! | key                                   | predicate                      |
//! |---------------------------------------|--------------------------------|
//! | `field=v`                             | equality (substring if the field only permits `contains`) |
//! | `field[eq]=v`                         | equality                       |
//! | `field[in]=a,b`                       | membership                     |
//! | `field[contains]=s`                   | case-insensitive substring     |
//! | `field[min]`, `field[gte]`, `minField` | inclusive lower bound         |
//! | `field[max]`, `field[lte]`, `maxField` | inclusive upper bound         |
//!
//! The resulting [`FilterSpec`] is storage-neutral: adapters translate it to
//! their own query language or evaluate it directly with [`FilterSpec::matches`].

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cursor::SeekBound;
use crate::error::QueryError;
use crate::schema::{FieldDescriptor, Operator, Schema};
use crate::traits::FieldAccess;
use crate::types::FieldValue;

/// Parameter names that carry pagination rather than filters.
pub const DEFAULT_RESERVED: [&str; 4] = ["page", "limit", "cursor", "sort"];

// ---------------------------------------------------------------------------
// Predicate
// ---------------------------------------------------------------------------

/// A condition on a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Predicate {
    Eq {
        value: FieldValue,
    },
    /// Inclusive on both ends; at least one bound is set.
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<FieldValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<FieldValue>,
    },
    In {
        values: Vec<FieldValue>,
    },
    /// Case-insensitive substring match on string values.
    Contains {
        needle: String,
    },
}

impl Predicate {
    /// The operator a field must permit for this predicate.
    #[must_use]
    pub fn operator(&self) -> Operator {
        match self {
            Predicate::Eq { .. } => Operator::Eq,
            Predicate::Range { .. } => Operator::Range,
            Predicate::In { .. } => Operator::In,
            Predicate::Contains { .. } => Operator::Contains,
        }
    }

    /// Evaluates the predicate against a field value. Absent and null values
    /// never match, and range bounds only compare against values of their
    /// own kind.
    #[must_use]
    pub fn matches(&self, value: Option<&FieldValue>) -> bool {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return false;
        };
        match self {
            Predicate::Eq { value: expected } => value == expected,
            Predicate::Range { min, max } => {
                let above_min = min
                    .as_ref()
                    .map_or(true, |m| value.compare_same_kind(m).is_some_and(|o| o.is_ge()));
                let below_max = max
                    .as_ref()
                    .map_or(true, |m| value.compare_same_kind(m).is_some_and(|o| o.is_le()));
                above_min && below_max
            }
            Predicate::In { values } => values.contains(value),
            Predicate::Contains { needle } => value
                .as_str()
                .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
        }
    }
}

// ---------------------------------------------------------------------------
// FilterSpec
// ---------------------------------------------------------------------------

/// Normalized filter: one predicate per allow-listed field, plus the keyset
/// bound the executor adds in cursor mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    predicates: BTreeMap<String, Predicate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seek: Option<SeekBound>,
}

impl FilterSpec {
    /// A filter that admits every record.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Predicate> {
        self.predicates.get(field)
    }

    /// Predicates in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Predicate)> {
        self.predicates.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.seek.is_none()
    }

    #[must_use]
    pub fn seek(&self) -> Option<&SeekBound> {
        self.seek.as_ref()
    }

    /// Returns a copy restricted to records after `bound`.
    #[must_use]
    pub fn with_seek(mut self, bound: SeekBound) -> Self {
        self.seek = Some(bound);
        self
    }

    /// Returns a copy without the keyset bound, as used for counting.
    #[must_use]
    pub fn without_seek(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
            seek: None,
        }
    }

    /// Evaluates every predicate and the keyset bound against `item`.
    pub fn matches<T: FieldAccess + ?Sized>(&self, item: &T) -> bool {
        self.predicates
            .iter()
            .all(|(field, predicate)| predicate.matches(item.field(field).as_ref()))
            && self.seek.as_ref().map_or(true, |bound| bound.admits(item))
    }
}

// ---------------------------------------------------------------------------
// FilterBuilder
// ---------------------------------------------------------------------------

/// What to do with parameters that name no allow-listed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFieldPolicy {
    /// Drop them silently (logged at `debug`).
    #[default]
    Ignore,
    /// Fail the request with a validation error.
    Reject,
}

/// Translates raw request parameters into a [`FilterSpec`].
#[derive(Debug, Clone)]
pub struct FilterBuilder<'a> {
    schema: &'a Schema,
    policy: UnknownFieldPolicy,
    reserved: BTreeSet<String>,
}

/// Operator named by a raw key before it is checked against the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Bare,
    Eq,
    In,
    Contains,
    Min,
    Max,
}

impl<'a> FilterBuilder<'a> {
    #[must_use]
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            policy: UnknownFieldPolicy::default(),
            reserved: DEFAULT_RESERVED.iter().map(|k| (*k).to_string()).collect(),
        }
    }

    #[must_use]
    pub fn policy(mut self, policy: UnknownFieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the set of keys that are never treated as filters.
    #[must_use]
    pub fn reserved<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Builds a filter from `(key, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Validation`] for a malformed value, an operator
    /// the field does not permit or that does not exist, two predicates on
    /// one field, a range whose minimum exceeds its maximum, or (under
    /// [`UnknownFieldPolicy::Reject`]) a key outside the allow-list.
    pub fn build<I, K, V>(&self, params: I) -> Result<FilterSpec, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut predicates = BTreeMap::new();

        for (key, raw) in params {
            let (key, raw) = (key.as_ref(), raw.as_ref());
            if self.reserved.contains(key) {
                continue;
            }
            let Some((descriptor, clause)) = self.resolve(key)? else {
                match self.policy {
                    UnknownFieldPolicy::Ignore => {
                        debug!(param = key, "ignoring parameter outside the allow-list");
                        continue;
                    }
                    UnknownFieldPolicy::Reject => {
                        return Err(QueryError::validation(key, "not in allow-list"));
                    }
                }
            };
            let predicate = parse_clause(descriptor, clause, raw)?;
            merge(&mut predicates, &descriptor.name, predicate)?;
        }

        for (field, predicate) in &predicates {
            if let Predicate::Range {
                min: Some(min),
                max: Some(max),
            } = predicate
            {
                if min.compare_same_kind(max).is_some_and(|o| o.is_gt()) {
                    return Err(QueryError::validation(
                        field.clone(),
                        "range minimum exceeds maximum",
                    ));
                }
            }
        }

        debug!(predicates = predicates.len(), "filter built");
        Ok(FilterSpec {
            predicates,
            seek: None,
        })
    }

    /// Maps a raw key to an allow-listed field and the clause it names.
    /// `Ok(None)` means the key refers to no allow-listed field.
    fn resolve(&self, key: &str) -> Result<Option<(&'a FieldDescriptor, Clause)>, QueryError> {
        if let Some((name, op)) = split_bracket(key) {
            let Some(descriptor) = self.schema.field(name) else {
                return Ok(None);
            };
            let clause = match op {
                "eq" => Clause::Eq,
                "in" => Clause::In,
                "contains" => Clause::Contains,
                "min" | "gte" => Clause::Min,
                "max" | "lte" => Clause::Max,
                other => {
                    return Err(QueryError::validation(
                        name,
                        format!("unknown operator `{other}`"),
                    ))
                }
            };
            return Ok(Some((descriptor, clause)));
        }

        if let Some(descriptor) = self.schema.field(key) {
            return Ok(Some((descriptor, Clause::Bare)));
        }

        for (prefix, clause) in [("min", Clause::Min), ("max", Clause::Max)] {
            if let Some(name) = key.strip_prefix(prefix).and_then(lower_first) {
                if let Some(descriptor) = self.schema.field(&name) {
                    return Ok(Some((descriptor, clause)));
                }
            }
        }
        Ok(None)
    }
}

/// Splits `name[op]` into its parts.
fn split_bracket(key: &str) -> Option<(&str, &str)> {
    let inner = key.strip_suffix(']')?;
    let (name, op) = inner.split_once('[')?;
    (!name.is_empty()).then_some((name, op))
}

/// `CreatedAt` -> `createdAt`; `None` unless the first letter is upper-case.
fn lower_first(rest: &str) -> Option<String> {
    let mut chars = rest.chars();
    let first = chars.next().filter(char::is_ascii_uppercase)?;
    Some(first.to_ascii_lowercase().to_string() + chars.as_str())
}

fn parse_clause(
    descriptor: &FieldDescriptor,
    clause: Clause,
    raw: &str,
) -> Result<Predicate, QueryError> {
    let operator = match clause {
        Clause::Bare if descriptor.permits(Operator::Eq) => Operator::Eq,
        Clause::Bare if descriptor.permits(Operator::Contains) => Operator::Contains,
        Clause::Bare | Clause::Eq => Operator::Eq,
        Clause::In => Operator::In,
        Clause::Contains => Operator::Contains,
        Clause::Min | Clause::Max => Operator::Range,
    };
    if !descriptor.permits(operator) {
        return Err(QueryError::validation(
            descriptor.name.clone(),
            format!("operator `{}` not permitted", operator.as_str()),
        ));
    }

    let parse = |text: &str| {
        descriptor
            .field_type
            .parse(text)
            .map_err(|reason| QueryError::validation(descriptor.name.clone(), reason))
    };

    Ok(match (operator, clause) {
        (Operator::Eq, _) => Predicate::Eq { value: parse(raw)? },
        (Operator::Contains, _) => Predicate::Contains {
            needle: raw.to_string(),
        },
        (Operator::In, _) => {
            let mut values = Vec::new();
            for element in raw.split(',').map(str::trim) {
                if element.is_empty() {
                    return Err(QueryError::validation(
                        descriptor.name.clone(),
                        "empty element in list",
                    ));
                }
                values.push(parse(element)?);
            }
            Predicate::In { values }
        }
        (Operator::Range, Clause::Min) => Predicate::Range {
            min: Some(parse(raw)?),
            max: None,
        },
        (Operator::Range, _) => Predicate::Range {
            min: None,
            max: Some(parse(raw)?),
        },
    })
}

fn merge(
    predicates: &mut BTreeMap<String, Predicate>,
    field: &str,
    incoming: Predicate,
) -> Result<(), QueryError> {
    let conflict = || QueryError::validation(field, "conflicting predicates");
    match predicates.entry(field.to_string()) {
        Entry::Vacant(slot) => {
            slot.insert(incoming);
            Ok(())
        }
        Entry::Occupied(mut slot) => match (slot.get_mut(), incoming) {
            (
                Predicate::Range { min, max },
                Predicate::Range {
                    min: new_min,
                    max: new_max,
                },
            ) => {
                if (min.is_some() && new_min.is_some()) || (max.is_some() && new_max.is_some()) {
                    return Err(conflict());
                }
                if new_min.is_some() {
                    *min = new_min;
                }
                if new_max.is_some() {
                    *max = new_max;
                }
                Ok(())
            }
            _ => Err(conflict()),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
