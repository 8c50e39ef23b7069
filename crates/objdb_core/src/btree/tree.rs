//! The B-tree engine: insertion with pre-emptive splits, search and
//! ordered traversal.

use crate::btree::node::{BTreeNode, Slot, SlotValue};
use crate::btree::persister::NodePersister;
use crate::btree::validator::{BTreeValidator, TreeReport};
use crate::error::{CoreError, CoreResult};
use crate::types::{NodeId, Oid};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The persisted description of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeHeader {
    /// Tree name.
    pub name: String,
    /// Degree `d`.
    pub degree: usize,
    /// Whether each key holds a single object.
    pub unique: bool,
    /// Number of stored values.
    pub size: u64,
    /// Root node.
    pub root: NodeId,
}

/// Traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Smallest key first.
    #[default]
    Ascending,
    /// Largest key first.
    Descending,
}

/// A B-tree of degree `d` mapping keys to object identifiers.
///
/// Every node except the root holds between `d-1` and `2d-1` keys. A unique
/// tree keeps one object per key and replaces it on re-insert; a multi-value
/// tree keeps every object inserted under a key, in insertion order.
/// Nodes live in the persister and are addressed by [`NodeId`].
#[derive(Debug)]
pub struct BTree<P: NodePersister> {
    id: Option<NodeId>,
    name: String,
    degree: usize,
    unique: bool,
    size: u64,
    root: NodeId,
    persister: P,
    validator: BTreeValidator,
}

impl<P: NodePersister> BTree<P> {
    /// Creates an empty tree with a single empty root.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedOperation`] if `degree < 2`.
    pub fn new(
        name: impl Into<String>,
        degree: usize,
        unique: bool,
        mut persister: P,
        validator: BTreeValidator,
    ) -> CoreResult<Self> {
        if degree < 2 {
            return Err(CoreError::unsupported(format!(
                "btree degree must be at least 2, got {degree}"
            )));
        }
        let root = persister.save(BTreeNode::new())?;
        Ok(Self {
            id: None,
            name: name.into(),
            degree,
            unique,
            size: 0,
            root,
            persister,
            validator,
        })
    }

    /// Restores a tree from its persisted header.
    ///
    /// Only the header is read; nodes are loaded as traversals reach them.
    pub fn load(mut persister: P, header_id: NodeId, validator: BTreeValidator) -> CoreResult<Self> {
        let header = persister.load_header(header_id)?;
        if header.degree < 2 {
            return Err(CoreError::invalid_format(format!(
                "tree header {header_id} has degree {}",
                header.degree
            )));
        }
        Ok(Self {
            id: Some(header_id),
            name: header.name,
            degree: header.degree,
            unique: header.unique,
            size: header.size,
            root: header.root,
            persister,
            validator,
        })
    }

    /// Inserts `oid` under `key`.
    pub fn insert(&mut self, key: Value, oid: Oid) -> CoreResult<()> {
        if self.persister.load(self.root)?.is_full(self.degree) {
            self.grow_root()?;
        }
        if self.insert_non_full(self.root, key, oid)? {
            self.size += 1;
        }
        Ok(())
    }

    /// Returns every object stored under `key`.
    pub fn search(&mut self, key: &Value) -> CoreResult<Vec<Oid>> {
        Ok(self
            .find(key)?
            .map(|value| value.oids().to_vec())
            .unwrap_or_default())
    }

    /// Returns the object stored under `key` in a unique tree.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedOperation`] on a multi-value tree.
    pub fn search_unique(&mut self, key: &Value) -> CoreResult<Option<Oid>> {
        if !self.unique {
            return Err(CoreError::unsupported(format!(
                "unique search on multi-value tree {}",
                self.name
            )));
        }
        Ok(self.find(key)?.and_then(|value| value.oids().first().copied()))
    }

    /// Returns the objects stored under `key` in a multi-value tree.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedOperation`] on a unique tree.
    pub fn search_multiple(&mut self, key: &Value) -> CoreResult<Vec<Oid>> {
        if self.unique {
            return Err(CoreError::unsupported(format!(
                "multi-value search on unique tree {}",
                self.name
            )));
        }
        self.search(key)
    }

    /// Returns all slots in key order.
    pub fn entries(&mut self, direction: Direction) -> CoreResult<Vec<Slot>> {
        let mut out = Vec::with_capacity(self.size as usize);
        self.collect(self.root, &mut out)?;
        if direction == Direction::Descending {
            out.reverse();
        }
        Ok(out)
    }

    /// Number of levels, walking the leftmost path.
    pub fn depth(&mut self) -> CoreResult<usize> {
        let mut depth = 1;
        let mut id = self.root;
        loop {
            let node = self.persister.load(id)?;
            if node.is_leaf() {
                return Ok(depth);
            }
            id = node.child(0)?;
            depth += 1;
        }
    }

    /// Walks the whole tree and checks every invariant.
    pub fn validate(&mut self) -> CoreResult<TreeReport> {
        self.validator
            .validate_tree(&mut self.persister, self.root, self.degree, self.size)
    }

    /// Persists the header and every pending node; returns the header id.
    ///
    /// Nodes are written before the header, so a durable header never names
    /// a root that was not written.
    pub fn flush(&mut self) -> CoreResult<NodeId> {
        self.persister.flush()?;
        let id = self.persister.save_header(self.id, &self.header())?;
        self.id = Some(id);
        Ok(id)
    }

    /// Flushes and closes the persister; returns the header id.
    pub fn close(mut self) -> CoreResult<NodeId> {
        let id = self.flush()?;
        self.persister.close()?;
        Ok(id)
    }

    /// The header describing the current state.
    #[must_use]
    pub fn header(&self) -> TreeHeader {
        TreeHeader {
            name: self.name.clone(),
            degree: self.degree,
            unique: self.unique,
            size: self.size,
            root: self.root,
        }
    }

    /// Number of stored values.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Degree `d`.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Tree name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether each key holds a single object.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Header identifier, once flushed.
    #[must_use]
    pub fn id(&self) -> Option<NodeId> {
        self.id
    }

    /// Root node identifier.
    #[must_use]
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// Loads the root node.
    pub fn root(&mut self) -> CoreResult<&BTreeNode> {
        self.persister.load(self.root)
    }

    /// Loads any node of this tree.
    pub fn node(&mut self, id: NodeId) -> CoreResult<&BTreeNode> {
        self.persister.load(id)
    }

    /// The node persister.
    pub fn persister(&self) -> &P {
        &self.persister
    }

    /// The node persister, mutably.
    pub fn persister_mut(&mut self) -> &mut P {
        &mut self.persister
    }

    fn find(&mut self, key: &Value) -> CoreResult<Option<SlotValue>> {
        let mut id = self.root;
        loop {
            let node = self.persister.load(id)?;
            match node.position(key) {
                Ok(i) => return Ok(node.slots().get(i).map(|slot| slot.value.clone())),
                Err(_) if node.is_leaf() => return Ok(None),
                Err(i) => id = node.child(i)?,
            }
        }
    }

    fn collect(&mut self, id: NodeId, out: &mut Vec<Slot>) -> CoreResult<()> {
        let node = self.persister.load(id)?.clone();
        if node.is_leaf() {
            out.extend(node.slots().iter().cloned());
            return Ok(());
        }
        for (i, child) in node.children().iter().enumerate() {
            self.collect(*child, out)?;
            if let Some(slot) = node.slots().get(i) {
                out.push(slot.clone());
            }
        }
        Ok(())
    }

    /// Puts a new empty root above the full one and splits the old root.
    fn grow_root(&mut self) -> CoreResult<()> {
        let old_root = self.root;
        let mut new_root = BTreeNode::new();
        new_root.push_child(old_root);
        let new_root = self.persister.save(new_root)?;

        let mut old = self.persister.load(old_root)?.clone();
        old.set_parent(Some(new_root));
        self.persister.save(old)?;

        self.root = new_root;
        self.split_child(new_root, 0)
    }

    /// Splits the full child `i` of `parent_id`, promoting its median.
    fn split_child(&mut self, parent_id: NodeId, i: usize) -> CoreResult<()> {
        let child_id = self.persister.load(parent_id)?.child(i)?;
        let mut left = self.persister.load(child_id)?.clone();
        let (median, mut right) = left.split_off(self.degree)?;

        left.set_parent(Some(parent_id));
        right.set_parent(Some(parent_id));
        let moved = right.children().to_vec();
        let right_id = self.persister.save(right)?;
        for grandchild in moved {
            let mut node = self.persister.load(grandchild)?.clone();
            node.set_parent(Some(right_id));
            self.persister.save(node)?;
        }
        self.persister.save(left)?;

        let mut parent = self.persister.load(parent_id)?.clone();
        parent.insert_slot(i, median);
        parent.insert_child(i + 1, right_id);
        self.persister.save(parent)?;

        if self.validator.is_enabled() {
            for id in [parent_id, child_id, right_id] {
                self.validator
                    .validate_node(&mut self.persister, id, self.root, self.degree)?;
            }
            self.validator
                .check_duplicate_children(&mut self.persister, child_id, right_id)?;
        }
        Ok(())
    }

    /// Inserts below `id`, which must not be full.
    ///
    /// Returns true if a new value was stored.
    fn insert_non_full(&mut self, mut id: NodeId, key: Value, oid: Oid) -> CoreResult<bool> {
        loop {
            let (position, leaf) = {
                let node = self.persister.load(id)?;
                (node.position(&key), node.is_leaf())
            };

            match position {
                Ok(i) => {
                    let mut node = self.persister.load(id)?.clone();
                    let added = node.merge_value(i, oid)?;
                    self.persister.save(node)?;
                    return Ok(added);
                }
                Err(i) if leaf => {
                    let mut node = self.persister.load(id)?.clone();
                    node.insert_slot(i, Slot::new(key, SlotValue::new(oid, self.unique)));
                    self.persister.save(node)?;
                    self.validator
                        .validate_node(&mut self.persister, id, self.root, self.degree)?;
                    return Ok(true);
                }
                Err(mut i) => {
                    let child = self.persister.load(id)?.child(i)?;
                    if self.persister.load(child)?.is_full(self.degree) {
                        self.split_child(id, i)?;
                        let promoted = self
                            .persister
                            .load(id)?
                            .key_at(i)
                            .cloned()
                            .ok_or_else(|| CoreError::structural("split lost its median"))?;
                        match key.cmp(&promoted) {
                            Ordering::Equal => continue,
                            Ordering::Greater => i += 1,
                            Ordering::Less => {}
                        }
                    }
                    id = self.persister.load(id)?.child(i)?;
                }
            }
        }
    }
}
