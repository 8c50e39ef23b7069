//! Per-class extent bookkeeping.

use crate::error::{CoreError, CoreResult};
use crate::schema::index::ClassIndex;
use crate::types::{ClassId, Oid};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A run of objects in extent order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// First object of the run.
    pub first: Option<Oid>,
    /// Last object of the run.
    pub last: Option<Oid>,
    /// Number of objects in the run.
    pub count: u64,
}

impl Zone {
    /// Returns true if the zone holds no object.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn push(&mut self, oid: Oid) {
        if self.first.is_none() {
            self.first = Some(oid);
        }
        self.last = Some(oid);
        self.count += 1;
    }
}

/// What the planner and executor know about a class.
///
/// Objects stored since the last commit sit in the uncommitted zone, which
/// continues the committed chain: the last committed object links to the
/// first uncommitted one.
#[derive(Debug)]
pub struct ClassInfo {
    id: ClassId,
    name: String,
    committed: Zone,
    uncommitted: Zone,
    indexes: Vec<ClassIndex>,
}

impl ClassInfo {
    /// Creates a class with an empty extent.
    pub fn new(id: ClassId, name: impl Into<String>) -> Self {
        Self::with_zone(id, name, Zone::default())
    }

    /// Creates a class whose committed extent is already known.
    pub fn with_zone(id: ClassId, name: impl Into<String>, committed: Zone) -> Self {
        Self {
            id,
            name: name.into(),
            committed,
            uncommitted: Zone::default(),
            indexes: Vec::new(),
        }
    }

    /// Class identifier.
    #[must_use]
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Committed zone.
    #[must_use]
    pub fn committed(&self) -> &Zone {
        &self.committed
    }

    /// Uncommitted zone.
    #[must_use]
    pub fn uncommitted(&self) -> &Zone {
        &self.uncommitted
    }

    /// Live objects across both zones.
    #[must_use]
    pub fn object_count(&self) -> u64 {
        self.committed.count + self.uncommitted.count
    }

    /// Where a full scan starts.
    ///
    /// The first committed object, or the first uncommitted one while
    /// nothing has been committed yet.
    #[must_use]
    pub fn scan_start(&self) -> Option<Oid> {
        self.committed.first.or(self.uncommitted.first)
    }

    /// The current tail of the extent.
    #[must_use]
    pub fn last_oid(&self) -> Option<Oid> {
        self.uncommitted.last.or(self.committed.last)
    }

    /// Appends a newly stored object to the uncommitted zone.
    pub fn record_new(&mut self, oid: Oid) {
        self.uncommitted.push(oid);
    }

    /// Folds the uncommitted zone into the committed one.
    pub fn commit(&mut self) {
        if self.uncommitted.is_empty() {
            return;
        }
        if self.committed.first.is_none() {
            self.committed.first = self.uncommitted.first;
        }
        self.committed.last = self.uncommitted.last;
        self.committed.count += self.uncommitted.count;
        self.uncommitted = Zone::default();
    }

    /// Declared indexes.
    #[must_use]
    pub fn indexes(&self) -> &[ClassIndex] {
        &self.indexes
    }

    /// Declared indexes, mutably.
    pub fn indexes_mut(&mut self) -> &mut [ClassIndex] {
        &mut self.indexes
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&ClassIndex> {
        self.indexes.iter().find(|index| index.name() == name)
    }

    /// Looks up an index by name, mutably.
    pub fn index_mut(&mut self, name: &str) -> Option<&mut ClassIndex> {
        self.indexes.iter_mut().find(|index| index.name() == name)
    }

    /// First index whose every field has a known value; returns the index
    /// and its search key.
    #[must_use]
    pub fn index_covering(&self, values: &BTreeMap<&str, &Value>) -> Option<(&ClassIndex, Value)> {
        self.indexes.iter().find_map(|index| {
            let parts: Option<Vec<Value>> = index
                .fields()
                .iter()
                .map(|field| values.get(field.as_str()).map(|v| (*v).clone()))
                .collect();
            parts.map(|parts| (index, Value::composite(parts)))
        })
    }

    /// Attaches an index.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedOperation`] if the class already has
    /// an index with that name.
    pub fn add_index(&mut self, index: ClassIndex) -> CoreResult<()> {
        if self.index(index.name()).is_some() {
            return Err(CoreError::unsupported(format!(
                "class {} already has an index named {}",
                self.name,
                index.name()
            )));
        }
        self.indexes.push(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_starts_uncommitted_until_first_commit() {
        let mut class = ClassInfo::new(ClassId::new(1), "Person");
        assert_eq!(class.scan_start(), None);

        class.record_new(Oid::new(5));
        class.record_new(Oid::new(8));
        assert_eq!(class.scan_start(), Some(Oid::new(5)));
        assert_eq!(class.committed().count, 0);
        assert_eq!(class.object_count(), 2);

        class.commit();
        class.record_new(Oid::new(11));
        assert_eq!(class.scan_start(), Some(Oid::new(5)));
        assert_eq!(class.last_oid(), Some(Oid::new(11)));
        assert_eq!(class.committed().last, Some(Oid::new(8)));
        assert_eq!(class.object_count(), 3);
    }

    #[test]
    fn commit_of_nothing_keeps_zones() {
        let mut class = ClassInfo::new(ClassId::new(2), "Empty");
        class.commit();
        assert!(class.committed().is_empty());
        assert!(class.uncommitted().is_empty());
    }
}
