//! Field values and rows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

static NULL: Value = Value::Null;

/// A totally ordered field value.
///
/// Values of different variants order by variant (`Null` first, `Array`
/// last); values of the same variant order naturally. Composite index and
/// order-by keys are `Array`s compared element by element. Floats are not
/// supported.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Absent or null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Ordered list of values.
    Array(Vec<Value>),
}

impl Value {
    /// Builds a composite key from its parts.
    #[must_use]
    pub fn composite(parts: Vec<Value>) -> Self {
        Value::Array(parts)
    }

    /// Returns true for `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

/// The attribute map of a stored object.
///
/// Fields are kept sorted by name. Reading a field that is not present
/// yields `Null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: BTreeMap<String, Value>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, builder style.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a field.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Returns a field value, `Null` when absent.
    #[must_use]
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL)
    }

    /// Builds a composite key from the named fields, in order.
    #[must_use]
    pub fn key_for<S: AsRef<str>>(&self, fields: &[S]) -> Value {
        Value::composite(fields.iter().map(|f| self.get(f.as_ref()).clone()).collect())
    }

    /// Number of fields present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_variant_ordering() {
        let mut values = vec![
            Value::Text("a".into()),
            Value::Integer(-5),
            Value::Null,
            Value::Bool(true),
            Value::Array(vec![]),
        ];
        values.sort();

        assert_eq!(values[0], Value::Null);
        assert_eq!(values[1], Value::Bool(true));
        assert_eq!(values[2], Value::Integer(-5));
        assert_eq!(values[3], Value::Text("a".into()));
    }

    #[test]
    fn integers_order_numerically() {
        assert!(Value::Integer(-2) < Value::Integer(-1));
        assert!(Value::Integer(9) < Value::Integer(10));
    }

    #[test]
    fn composite_keys_compare_elementwise() {
        let a = Value::composite(vec!["smith".into(), 30.into()]);
        let b = Value::composite(vec!["smith".into(), 41.into()]);
        let c = Value::composite(vec!["taylor".into(), 1.into()]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn missing_field_reads_null() {
        let row = Row::new().with("name", "ada");
        assert_eq!(row.get("name"), &Value::from("ada"));
        assert!(row.get("age").is_null());
        assert_eq!(
            row.key_for(&["name", "age"]),
            Value::composite(vec!["ada".into(), Value::Null])
        );
    }

    #[test]
    fn display_composite() {
        let key = Value::composite(vec!["x".into(), 1.into(), Value::Null]);
        assert_eq!(key.to_string(), "[\"x\", 1, null]");
    }
}
