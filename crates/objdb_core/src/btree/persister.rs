//! Node persistence contract and the in-memory strategy.

use crate::btree::node::BTreeNode;
use crate::btree::tree::TreeHeader;
use crate::error::{CoreError, CoreResult};
use crate::types::NodeId;
use std::collections::HashMap;

/// Maps node identifiers to resident nodes.
///
/// The persister is the sole owner of every node of a tree. The engine
/// borrows a node through [`NodePersister::load`], works on a copy and hands
/// it back through [`NodePersister::save`].
pub trait NodePersister {
    /// Returns the node stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no node has that identifier.
    fn load(&mut self, id: NodeId) -> CoreResult<&BTreeNode>;

    /// Stores a node and returns its identifier.
    ///
    /// A node without an identifier gets a fresh one; otherwise the stored
    /// node is replaced.
    fn save(&mut self, node: BTreeNode) -> CoreResult<NodeId>;

    /// Stores a tree header, assigning an identifier if `id` is `None`.
    fn save_header(&mut self, id: Option<NodeId>, header: &TreeHeader) -> CoreResult<NodeId>;

    /// Reads a tree header.
    fn load_header(&mut self, id: NodeId) -> CoreResult<TreeHeader>;

    /// Writes pending changes through to storage.
    fn flush(&mut self) -> CoreResult<()>;

    /// Flushes and releases resident nodes.
    fn close(&mut self) -> CoreResult<()>;
}

/// Keeps every node resident; identifiers index straight into the arena.
///
/// Used for transient trees built and consumed within one query, such as
/// the order-by tree of a result sink. Nothing is written anywhere.
#[derive(Debug, Default)]
pub struct InMemoryPersister {
    nodes: HashMap<NodeId, BTreeNode>,
    headers: HashMap<NodeId, TreeHeader>,
    next_id: u64,
}

impl InMemoryPersister {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resident nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn allocate(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId::new(self.next_id)
    }
}

impl NodePersister for InMemoryPersister {
    fn load(&mut self, id: NodeId) -> CoreResult<&BTreeNode> {
        self.nodes
            .get(&id)
            .ok_or_else(|| CoreError::node_not_found(id.as_u64()))
    }

    fn save(&mut self, mut node: BTreeNode) -> CoreResult<NodeId> {
        let id = match node.id() {
            Some(id) => id,
            None => {
                let id = self.allocate();
                node.set_id(id);
                id
            }
        };
        self.nodes.insert(id, node);
        Ok(id)
    }

    fn save_header(&mut self, id: Option<NodeId>, header: &TreeHeader) -> CoreResult<NodeId> {
        let id = match id {
            Some(id) => id,
            None => self.allocate(),
        };
        self.headers.insert(id, header.clone());
        Ok(id)
    }

    fn load_header(&mut self, id: NodeId) -> CoreResult<TreeHeader> {
        self.headers
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                kind: "tree header",
                id: id.as_u64(),
            })
    }

    fn flush(&mut self) -> CoreResult<()> {
        Ok(())
    }

    fn close(&mut self) -> CoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_assigns_then_keeps_id() {
        let mut persister = InMemoryPersister::new();
        let id = persister.save(BTreeNode::new()).unwrap();

        let mut node = persister.load(id).unwrap().clone();
        assert_eq!(node.id(), Some(id));
        node.set_parent(Some(NodeId::new(99)));
        assert_eq!(persister.save(node).unwrap(), id);

        assert_eq!(persister.node_count(), 1);
        assert_eq!(persister.load(id).unwrap().parent(), Some(NodeId::new(99)));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let mut persister = InMemoryPersister::new();
        assert!(matches!(
            persister.load(NodeId::new(5)),
            Err(CoreError::NotFound { kind: "node", id: 5 })
        ));
        assert!(matches!(
            persister.load_header(NodeId::new(5)),
            Err(CoreError::NotFound { .. })
        ));
    }
}
