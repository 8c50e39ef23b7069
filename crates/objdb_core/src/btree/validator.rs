//! Structural invariant checks over tree nodes.

use crate::btree::node::BTreeNode;
use crate::btree::persister::NodePersister;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::types::NodeId;
use crate::value::Value;
use serde::Serialize;
use std::collections::HashSet;

/// Summary of a full tree walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeReport {
    /// Number of levels.
    pub depth: usize,
    /// Number of nodes.
    pub nodes: u64,
    /// Number of keys.
    pub keys: u64,
    /// Number of stored values.
    pub values: u64,
}

/// Checks node invariants.
///
/// The per-node checks run during inserts only when the validator is
/// enabled; when disabled they return immediately. A violation is always a
/// [`CoreError::StructuralInconsistency`], regardless of any scan policy.
/// [`BTreeValidator::validate_tree`] is an explicit diagnostic and runs
/// either way.
#[derive(Debug, Clone, Copy, Default)]
pub struct BTreeValidator {
    enabled: bool,
}

impl BTreeValidator {
    /// Creates a validator.
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Creates a validator following `config.validation_enabled`.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self::new(config.validation_enabled)
    }

    /// Returns true if per-node checks are active.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Checks one node of the tree rooted at `root`.
    pub fn validate_node<P: NodePersister>(
        &self,
        persister: &mut P,
        id: NodeId,
        root: NodeId,
        degree: usize,
    ) -> CoreResult<()> {
        if !self.enabled {
            return Ok(());
        }
        check_node(persister, id, root, degree)
    }

    /// Fails if two sibling nodes share a child.
    pub fn check_duplicate_children<P: NodePersister>(
        &self,
        persister: &mut P,
        a: NodeId,
        b: NodeId,
    ) -> CoreResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if a == b {
            return Err(CoreError::structural(format!("{a} is its own sibling")));
        }
        let left: HashSet<NodeId> = persister.load(a)?.children().iter().copied().collect();
        if let Some(shared) = persister
            .load(b)?
            .children()
            .iter()
            .find(|child| left.contains(child))
        {
            return Err(CoreError::structural(format!(
                "{shared} is a child of both {a} and {b}"
            )));
        }
        Ok(())
    }

    /// Returns true if `key` is one of the keys held by `id`.
    ///
    /// Always false when disabled.
    pub fn search_key<P: NodePersister>(
        &self,
        persister: &mut P,
        key: &Value,
        id: NodeId,
    ) -> CoreResult<bool> {
        if !self.enabled {
            return Ok(false);
        }
        Ok(persister.load(id)?.position(key).is_ok())
    }

    /// Walks the whole tree, checking every node, equal leaf depth, key
    /// order across nodes and that `expected_size` matches the stored
    /// values.
    pub fn validate_tree<P: NodePersister>(
        &self,
        persister: &mut P,
        root: NodeId,
        degree: usize,
        expected_size: u64,
    ) -> CoreResult<TreeReport> {
        let mut walk = Walk {
            root,
            degree,
            report: TreeReport::default(),
            leaf_depth: None,
            last_key: None,
        };
        walk.visit(persister, root, 1)?;

        if walk.report.values != expected_size {
            return Err(CoreError::structural(format!(
                "tree size is {expected_size} but {} values are stored",
                walk.report.values
            )));
        }
        Ok(walk.report)
    }
}

struct Walk {
    root: NodeId,
    degree: usize,
    report: TreeReport,
    leaf_depth: Option<usize>,
    last_key: Option<Value>,
}

impl Walk {
    fn visit<P: NodePersister>(&mut self, persister: &mut P, id: NodeId, depth: usize) -> CoreResult<()> {
        check_node(persister, id, self.root, self.degree)?;
        let node = persister.load(id)?.clone();
        self.report.nodes += 1;
        self.report.keys += node.key_count() as u64;
        self.report.values += node.value_count() as u64;

        if node.is_leaf() {
            match self.leaf_depth {
                Some(expected) if expected != depth => {
                    return Err(CoreError::structural(format!(
                        "leaf {id} at depth {depth}, other leaves at {expected}"
                    )));
                }
                Some(_) => {}
                None => {
                    self.leaf_depth = Some(depth);
                    self.report.depth = depth;
                }
            }
            for slot in node.slots() {
                self.advance(id, &slot.key)?;
            }
            return Ok(());
        }

        for (i, child) in node.children().iter().enumerate() {
            self.visit(persister, *child, depth + 1)?;
            if let Some(slot) = node.slots().get(i) {
                self.advance(id, &slot.key)?;
            }
        }
        Ok(())
    }

    fn advance(&mut self, id: NodeId, key: &Value) -> CoreResult<()> {
        if let Some(last) = &self.last_key {
            if last >= key {
                return Err(CoreError::structural(format!(
                    "key {key} in {id} does not follow {last}"
                )));
            }
        }
        self.last_key = Some(key.clone());
        Ok(())
    }
}

fn check_node<P: NodePersister>(
    persister: &mut P,
    id: NodeId,
    root: NodeId,
    degree: usize,
) -> CoreResult<()> {
    let node = persister.load(id)?.clone();
    let is_root = id == root;
    let keys = node.key_count();
    let violation = |what: String| Err(CoreError::structural(format!("{id}: {what}")));

    match (is_root, node.parent()) {
        (true, Some(parent)) => return violation(format!("root has parent {parent}")),
        (false, None) => return violation("non-root node has no parent".to_string()),
        _ => {}
    }
    if !is_root && keys + 1 < degree {
        return violation(format!("{keys} keys, minimum is {}", degree - 1));
    }
    if keys > 2 * degree - 1 {
        return violation(format!("{keys} keys, maximum is {}", 2 * degree - 1));
    }
    if node.child_count() > 2 * degree {
        return violation(format!("{} children, maximum is {}", node.child_count(), 2 * degree));
    }
    if !node.is_leaf() {
        if keys == 0 {
            return violation("children but no keys".to_string());
        }
        if node.child_count() != keys + 1 {
            return violation(format!("{keys} keys but {} children", node.child_count()));
        }
    }
    if let Some(pair) = node.slots().windows(2).find(|w| w[0].key >= w[1].key) {
        return violation(format!("key {} not below {}", pair[0].key, pair[1].key));
    }
    if let Some(slot) = node.slots().iter().find(|s| s.value.is_empty()) {
        return violation(format!("key {} holds no value", slot.key));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = node.children().iter().find(|c| !seen.insert(**c)) {
        return violation(format!("child {dup} appears twice"));
    }

    check_separators(persister, id, &node)
}

fn check_separators<P: NodePersister>(
    persister: &mut P,
    id: NodeId,
    node: &BTreeNode,
) -> CoreResult<()> {
    if node.is_leaf() {
        return Ok(());
    }
    for (i, slot) in node.slots().iter().enumerate() {
        let left = persister.load(node.child(i)?)?;
        if left.parent() != Some(id) {
            return Err(CoreError::structural(format!(
                "{id}: child {i} points at parent {:?}",
                left.parent()
            )));
        }
        if left.slots().last().is_some_and(|last| last.key >= slot.key) {
            return Err(CoreError::structural(format!(
                "{id}: left child {i} holds a key not below pivot {}",
                slot.key
            )));
        }

        let right = persister.load(node.child(i + 1)?)?;
        if right.slots().first().is_some_and(|first| first.key <= slot.key) {
            return Err(CoreError::structural(format!(
                "{id}: right child {} holds a key not above pivot {}",
                i + 1,
                slot.key
            )));
        }
    }
    Ok(())
}
