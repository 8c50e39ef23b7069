//! Query predicates over rows.

use crate::value::{Row, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A predicate over the fields of a row.
///
/// Missing fields read as `Null`. Ordering comparisons never match when
/// either side is `Null`; `Equal` and `NotEqual` compare `Null` like any
/// other value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    /// `field == value`
    Equal(String, Value),
    /// `field != value`
    NotEqual(String, Value),
    /// `field > value`
    GreaterThan(String, Value),
    /// `field >= value`
    GreaterOrEqual(String, Value),
    /// `field < value`
    LessThan(String, Value),
    /// `field <= value`
    LessOrEqual(String, Value),
    /// The field is null or absent.
    IsNull(String),
    /// The field is present and not null.
    IsNotNull(String),
    /// All of the criteria hold.
    And(Vec<Criterion>),
    /// Any of the criteria holds.
    Or(Vec<Criterion>),
    /// The criterion does not hold.
    Not(Box<Criterion>),
}

impl Criterion {
    /// `field == value`
    pub fn equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equal(field.into(), value.into())
    }

    /// `field != value`
    pub fn not_equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::NotEqual(field.into(), value.into())
    }

    /// `field > value`
    pub fn greater_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::GreaterThan(field.into(), value.into())
    }

    /// `field >= value`
    pub fn greater_or_equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::GreaterOrEqual(field.into(), value.into())
    }

    /// `field < value`
    pub fn less_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::LessThan(field.into(), value.into())
    }

    /// `field <= value`
    pub fn less_or_equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::LessOrEqual(field.into(), value.into())
    }

    /// Negates a criterion.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(criterion: Criterion) -> Self {
        Self::Not(Box::new(criterion))
    }

    /// Evaluates the criterion against a row.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Self::Equal(field, value) => row.get(field) == value,
            Self::NotEqual(field, value) => row.get(field) != value,
            Self::GreaterThan(field, value) => compare(row.get(field), value, Ordering::is_gt),
            Self::GreaterOrEqual(field, value) => compare(row.get(field), value, Ordering::is_ge),
            Self::LessThan(field, value) => compare(row.get(field), value, Ordering::is_lt),
            Self::LessOrEqual(field, value) => compare(row.get(field), value, Ordering::is_le),
            Self::IsNull(field) => row.get(field).is_null(),
            Self::IsNotNull(field) => !row.get(field).is_null(),
            Self::And(all) => all.iter().all(|c| c.matches(row)),
            Self::Or(any) => any.iter().any(|c| c.matches(row)),
            Self::Not(inner) => !inner.matches(row),
        }
    }

    /// Fields pinned to a single value by top-level equalities.
    ///
    /// Looks through `And` but not through `Or` or `Not`. The first
    /// equality on a field wins.
    #[must_use]
    pub fn equality_values(&self) -> BTreeMap<&str, &Value> {
        let mut out = BTreeMap::new();
        self.collect_equalities(&mut out);
        out
    }

    fn collect_equalities<'a>(&'a self, out: &mut BTreeMap<&'a str, &'a Value>) {
        match self {
            Self::Equal(field, value) => {
                out.entry(field.as_str()).or_insert(value);
            }
            Self::And(all) => all.iter().for_each(|c| c.collect_equalities(out)),
            _ => {}
        }
    }
}

fn compare(actual: &Value, expected: &Value, accept: fn(Ordering) -> bool) -> bool {
    if actual.is_null() || expected.is_null() {
        return false;
    }
    accept(actual.cmp(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        Row::new().with("name", "ada").with("age", 36)
    }

    #[test]
    fn comparisons() {
        let row = row();
        assert!(Criterion::equal("name", "ada").matches(&row));
        assert!(Criterion::not_equal("name", "bob").matches(&row));
        assert!(Criterion::greater_than("age", 30).matches(&row));
        assert!(Criterion::greater_or_equal("age", 36).matches(&row));
        assert!(!Criterion::less_than("age", 36).matches(&row));
        assert!(Criterion::less_or_equal("age", 36).matches(&row));
    }

    #[test]
    fn missing_fields_are_null() {
        let row = row();
        assert!(Criterion::IsNull("email".into()).matches(&row));
        assert!(Criterion::IsNotNull("name".into()).matches(&row));
        assert!(!Criterion::greater_than("email", 0).matches(&row));
        assert!(!Criterion::less_than("email", 0).matches(&row));
        assert!(Criterion::equal("email", ()).matches(&row));
    }

    #[test]
    fn boolean_combinators() {
        let row = row();
        let adult_ada = Criterion::And(vec![
            Criterion::equal("name", "ada"),
            Criterion::greater_or_equal("age", 18),
        ]);
        assert!(adult_ada.matches(&row));
        assert!(!Criterion::not(adult_ada).matches(&row));
        assert!(Criterion::Or(vec![
            Criterion::equal("name", "bob"),
            Criterion::equal("age", 36),
        ])
        .matches(&row));
    }

    #[test]
    fn equality_values_look_through_and_only() {
        let c = Criterion::And(vec![
            Criterion::equal("a", 1),
            Criterion::And(vec![Criterion::equal("b", 2), Criterion::equal("a", 9)]),
            Criterion::Or(vec![Criterion::equal("c", 3)]),
            Criterion::greater_than("d", 4),
        ]);
        let values = c.equality_values();
        assert_eq!(values.len(), 2);
        assert_eq!(values.get("a"), Some(&&Value::Integer(1)));
        assert_eq!(values.get("b"), Some(&&Value::Integer(2)));
    }
}
