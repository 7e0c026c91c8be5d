//! Typed field values and the field types that parse them from raw text.
//!
//! Every value a filter, sort, or cursor carries is a [`FieldValue`]. Values
//! are totally ordered so that sorting, range checks, and keyset seeking all
//! agree on a single comparison.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// A single typed scalar drawn from a record or a request parameter.
///
/// Variant order defines cross-type ordering: `Null` sorts before every other
/// value. Numbers are always finite and compare by IEEE total order.
///
/// Serializes adjacently tagged (`{"t": "number", "v": 1.5}`) so that strings
/// and dates survive a round-trip without ambiguity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "lowercase")]
pub enum FieldValue {
    /// Absent or explicit null.
    Null,
    /// UTF-8 text. Enum-typed fields also carry their variant here.
    String(String),
    /// Finite 64-bit float.
    Number(OrderedFloat<f64>),
    /// UTC timestamp.
    Date(DateTime<Utc>),
}

impl FieldValue {
    /// Creates a string value.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Creates a numeric value.
    #[must_use]
    pub fn number(value: f64) -> Self {
        Self::Number(OrderedFloat(value))
    }

    /// Creates a date value.
    #[must_use]
    pub fn date(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }

    /// Returns `true` for [`FieldValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text of a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the float of a numeric value.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n.into_inner()),
            _ => None,
        }
    }

    /// Whether two values are of the same variant and therefore meaningfully comparable.
    #[must_use]
    pub fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Compares two values only when they are of the same kind.
    #[must_use]
    pub fn compare_same_kind(&self, other: &Self) -> Option<Ordering> {
        self.same_kind(other).then(|| self.cmp(other))
    }

    /// Renders the value as plain JSON: strings and dates as JSON strings,
    /// integral numbers as JSON integers.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Number(n) => {
                let f = n.into_inner();
                // Integral values within the exactly-representable range print without a fraction.
                if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
                    serde_json::Value::from(f as i64)
                } else {
                    serde_json::Number::from_f64(f).map_or(serde_json::Value::Null, Into::into)
                }
            }
            Self::Date(d) => serde_json::Value::String(d.to_rfc3339()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::number(value)
    }
}

impl From<i64> for FieldValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::number(value as f64)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

// ---------------------------------------------------------------------------
// FieldType
// ---------------------------------------------------------------------------

/// Declared type of an allow-listed field. Governs how raw text is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    /// Free text.
    String,
    /// Finite number.
    Number,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (midnight UTC).
    Date,
    /// One of a closed set of string variants.
    Enum { variants: Vec<String> },
}

impl FieldType {
    /// Short lowercase name used in messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Enum { .. } => "enum",
        }
    }

    /// Whether substring matching makes sense for this type.
    #[must_use]
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::String | FieldType::Enum { .. })
    }

    /// Parses raw request text into a value of this type.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the text is not a valid value of
    /// this type. Callers attach the field name.
    pub fn parse(&self, raw: &str) -> Result<FieldValue, String> {
        match self {
            FieldType::String => Ok(FieldValue::string(raw)),
            FieldType::Number => parse_number(raw),
            FieldType::Date => parse_date(raw),
            FieldType::Enum { variants } => {
                if variants.iter().any(|v| v == raw) {
                    Ok(FieldValue::string(raw))
                } else {
                    Err(format!(
                        "expected one of [{}], got `{raw}`",
                        variants.join(", ")
                    ))
                }
            }
        }
    }

    /// Converts a JSON value (e.g. from a seed file) into a value of this type.
    ///
    /// JSON `null` always converts to [`FieldValue::Null`].
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the JSON shape does not fit the type.
    pub fn from_json(&self, value: &serde_json::Value) -> Result<FieldValue, String> {
        use serde_json::Value;

        match (self, value) {
            (_, Value::Null) => Ok(FieldValue::Null),
            (FieldType::Number, Value::Number(n)) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(FieldValue::number)
                .ok_or_else(|| format!("number `{n}` is not representable")),
            (FieldType::Number, Value::String(s)) => parse_number(s),
            (_, Value::String(s)) => self.parse(s),
            (_, other) => Err(format!("expected a {}, got `{other}`", self.as_str())),
        }
    }

    /// Whether an already-typed value can belong to a field of this type.
    /// `Null` fits every type.
    #[must_use]
    pub fn admits(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (_, FieldValue::Null) => true,
            (FieldType::String, FieldValue::String(_)) => true,
            (FieldType::Enum { variants }, FieldValue::String(s)) => variants.contains(s),
            (FieldType::Number, FieldValue::Number(_)) => true,
            (FieldType::Date, FieldValue::Date(_)) => true,
            _ => false,
        }
    }
}

fn parse_number(raw: &str) -> Result<FieldValue, String> {
    let parsed: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("expected a number, got `{raw}`"))?;
    if parsed.is_finite() {
        Ok(FieldValue::number(parsed))
    } else {
        Err(format!("number must be finite, got `{raw}`"))
    }
}

fn parse_date(raw: &str) -> Result<FieldValue, String> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(FieldValue::Date(ts.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| FieldValue::Date(dt.and_utc()))
        .ok_or_else(|| format!("expected an RFC 3339 timestamp or YYYY-MM-DD date, got `{raw}`"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
