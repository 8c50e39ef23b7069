//! Secondary indexes bound to a class.

use crate::btree::{BTree, LazyPersister};
use crate::types::ClassId;
use crate::value::{Row, Value};

/// A named index over an ordered list of fields of one class.
///
/// The key of an object is the composite of its field values, in field
/// order. The backing tree is persisted through the object store.
#[derive(Debug)]
pub struct ClassIndex {
    name: String,
    class_id: ClassId,
    fields: Vec<String>,
    tree: BTree<LazyPersister>,
}

impl ClassIndex {
    /// Binds a tree to a class.
    pub fn new(
        name: impl Into<String>,
        class_id: ClassId,
        fields: Vec<String>,
        tree: BTree<LazyPersister>,
    ) -> Self {
        Self {
            name: name.into(),
            class_id,
            fields,
            tree,
        }
    }

    /// Index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning class.
    #[must_use]
    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    /// Indexed fields, in key order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Whether each key maps to a single object.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.tree.is_unique()
    }

    /// Values held by the backing tree.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.tree.size()
    }

    /// The key `row` is indexed under.
    #[must_use]
    pub fn key_for(&self, row: &Row) -> Value {
        row.key_for(&self.fields)
    }

    /// The backing tree.
    #[must_use]
    pub fn tree(&self) -> &BTree<LazyPersister> {
        &self.tree
    }

    /// The backing tree, mutably.
    pub fn tree_mut(&mut self) -> &mut BTree<LazyPersister> {
        &mut self.tree
    }
}
