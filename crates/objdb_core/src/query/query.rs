//! Query description.

use crate::btree::Direction;
use crate::query::criteria::Criterion;
use crate::types::Oid;
use crate::value::{Row, Value};

/// What to fetch: a class, an optional predicate or object identifier, and
/// an optional ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    class: String,
    criterion: Option<Criterion>,
    oid: Option<Oid>,
    order_by: Vec<String>,
    direction: Direction,
}

impl Query {
    /// Selects every object of `class`.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            criterion: None,
            oid: None,
            order_by: Vec::new(),
            direction: Direction::Ascending,
        }
    }

    /// Restricts the result to objects matching `criterion`.
    #[must_use]
    pub fn filter(mut self, criterion: Criterion) -> Self {
        self.criterion = Some(criterion);
        self
    }

    /// Restricts the result to a single known object.
    #[must_use]
    pub fn by_oid(mut self, oid: Oid) -> Self {
        self.oid = Some(oid);
        self
    }

    /// Orders the result by the given fields, ascending.
    #[must_use]
    pub fn order_by<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.order_by = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Reverses the ordering.
    #[must_use]
    pub fn descending(mut self) -> Self {
        self.direction = Direction::Descending;
        self
    }

    /// Target class name.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// The predicate, if any.
    #[must_use]
    pub fn criterion(&self) -> Option<&Criterion> {
        self.criterion.as_ref()
    }

    /// The object identifier, for point lookups.
    #[must_use]
    pub fn oid(&self) -> Option<Oid> {
        self.oid
    }

    /// Ordering fields.
    #[must_use]
    pub fn order_fields(&self) -> &[String] {
        &self.order_by
    }

    /// Ordering direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns true if the result must be sorted.
    #[must_use]
    pub fn has_order_by(&self) -> bool {
        !self.order_by.is_empty()
    }

    /// Returns true if `row` satisfies the predicate.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        self.criterion.as_ref().map_or(true, |c| c.matches(row))
    }

    /// The composite sort key of `row`.
    #[must_use]
    pub fn order_key(&self, row: &Row) -> Value {
        row.key_for(&self.order_by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_order_key() {
        let query = Query::new("Person")
            .filter(Criterion::greater_than("age", 18))
            .order_by(["last", "first"])
            .descending();

        assert_eq!(query.class(), "Person");
        assert!(query.has_order_by());
        assert_eq!(query.direction(), Direction::Descending);

        let row = Row::new().with("first", "ada").with("last", "lovelace").with("age", 36);
        assert!(query.matches(&row));
        assert_eq!(
            query.order_key(&row),
            Value::composite(vec!["lovelace".into(), "ada".into()])
        );
    }

    #[test]
    fn unfiltered_query_matches_everything() {
        let query = Query::new("Person");
        assert!(query.matches(&Row::new()));
        assert!(!query.has_order_by());
        assert_eq!(query.oid(), None);
    }
}
