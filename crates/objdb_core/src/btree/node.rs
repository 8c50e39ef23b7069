//! In-memory representation of a single tree node.

use crate::error::{CoreError, CoreResult};
use crate::types::{NodeId, Oid};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::slice;

/// The value side of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotValue {
    /// One object per key (unique trees).
    Single(Oid),
    /// Objects sharing the key, in insertion order (multi-value trees).
    Multiple(Vec<Oid>),
}

impl SlotValue {
    /// Creates the initial value for a tree of the given kind.
    #[must_use]
    pub fn new(oid: Oid, unique: bool) -> Self {
        if unique {
            SlotValue::Single(oid)
        } else {
            SlotValue::Multiple(vec![oid])
        }
    }

    /// The objects held by this slot.
    #[must_use]
    pub fn oids(&self) -> &[Oid] {
        match self {
            SlotValue::Single(oid) => slice::from_ref(oid),
            SlotValue::Multiple(oids) => oids,
        }
    }

    /// Number of objects held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.oids().len()
    }

    /// Returns true if no object is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A key and its value(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// The key.
    pub key: Value,
    /// The object(s) stored under the key.
    pub value: SlotValue,
}

impl Slot {
    /// Creates a slot.
    #[must_use]
    pub fn new(key: Value, value: SlotValue) -> Self {
        Self { key, value }
    }
}

/// One B-tree node.
///
/// A node with no children is a leaf. The identifier is assigned by the
/// persister on first save and is not part of the stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BTreeNode {
    #[serde(skip)]
    id: Option<NodeId>,
    parent: Option<NodeId>,
    slots: Vec<Slot>,
    children: Vec<NodeId>,
}

impl BTreeNode {
    /// Creates an empty, unsaved leaf.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The persister-assigned identifier, if saved.
    #[must_use]
    pub fn id(&self) -> Option<NodeId> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: NodeId) {
        self.id = Some(id);
    }

    /// The parent node, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Sets the parent reference.
    pub fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    /// The slots, ascending by key.
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Child identifiers, left to right.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Number of keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Returns true if the node has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns true if the node holds `2d-1` keys.
    #[must_use]
    pub fn is_full(&self, degree: usize) -> bool {
        self.slots.len() >= 2 * degree - 1
    }

    /// Key of slot `i`.
    #[must_use]
    pub fn key_at(&self, i: usize) -> Option<&Value> {
        self.slots.get(i).map(|s| &s.key)
    }

    /// The middle slot, if any.
    #[must_use]
    pub fn median(&self) -> Option<&Slot> {
        if self.slots.is_empty() {
            None
        } else {
            self.slots.get((self.slots.len() - 1) / 2)
        }
    }

    /// Number of objects held by this node's slots.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.slots.iter().map(|s| s.value.len()).sum()
    }

    /// Locates `key`: `Ok(i)` if slot `i` holds it, otherwise `Err(i)` with
    /// the child index (or insertion point) to continue at.
    pub fn position(&self, key: &Value) -> Result<usize, usize> {
        self.slots.binary_search_by(|slot| slot.key.cmp(key))
    }

    /// Child `i`, or a structural error if the node does not have it.
    pub fn child(&self, i: usize) -> CoreResult<NodeId> {
        self.children.get(i).copied().ok_or_else(|| {
            CoreError::structural(format!(
                "node {:?} has {} children, child {} requested",
                self.id,
                self.children.len(),
                i
            ))
        })
    }

    /// Inserts a slot at position `i`.
    pub fn insert_slot(&mut self, i: usize, slot: Slot) {
        self.slots.insert(i, slot);
    }

    /// Inserts a child reference at position `i`.
    pub fn insert_child(&mut self, i: usize, child: NodeId) {
        self.children.insert(i, child);
    }

    /// Appends a child reference.
    pub fn push_child(&mut self, child: NodeId) {
        self.children.push(child);
    }

    /// Adds `oid` under the existing slot `i`.
    ///
    /// A unique tree replaces the held object; a multi-value tree appends.
    /// Returns true when a new value was added.
    pub(crate) fn merge_value(&mut self, i: usize, oid: Oid) -> CoreResult<bool> {
        let slot = self
            .slots
            .get_mut(i)
            .ok_or_else(|| CoreError::structural(format!("slot {i} out of range")))?;
        match &mut slot.value {
            SlotValue::Single(existing) => {
                *existing = oid;
                Ok(false)
            }
            SlotValue::Multiple(oids) => {
                oids.push(oid);
                Ok(true)
            }
        }
    }

    /// Splits a full node around its median.
    ///
    /// The node keeps the left `d-1` slots (and `d` children); the median
    /// slot and a new, unsaved right sibling with the remaining `d-1` slots
    /// (and `d` children) are returned.
    pub(crate) fn split_off(&mut self, degree: usize) -> CoreResult<(Slot, BTreeNode)> {
        if self.slots.len() != 2 * degree - 1 {
            return Err(CoreError::structural(format!(
                "split of node {:?} with {} keys, expected {}",
                self.id,
                self.slots.len(),
                2 * degree - 1
            )));
        }

        let right_slots = self.slots.split_off(degree);
        let median = self
            .slots
            .pop()
            .ok_or_else(|| CoreError::structural("split of an empty node"))?;
        let right_children = if self.is_leaf() {
            Vec::new()
        } else {
            self.children.split_off(degree)
        };

        let right = BTreeNode {
            id: None,
            parent: self.parent,
            slots: right_slots,
            children: right_children,
        };
        Ok((median, right))
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        parent: Option<NodeId>,
        slots: Vec<Slot>,
        children: Vec<NodeId>,
    ) -> Self {
        Self {
            id: None,
            parent,
            slots,
            children,
        }
    }
}
