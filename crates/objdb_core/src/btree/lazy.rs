//! Lazy node persistence through the object store.

use crate::btree::node::BTreeNode;
use crate::btree::persister::NodePersister;
use crate::btree::tree::TreeHeader;
use crate::codec;
use crate::error::{CoreError, CoreResult};
use crate::store::NodeStore;
use crate::types::{NodeId, Oid};
use objdb_storage::RecordKind;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Fetches and writes tree nodes on demand, addressed by OID.
///
/// Only nodes a traversal actually reaches are read; children are never
/// loaded eagerly. Saved nodes stay resident and dirty until
/// [`NodePersister::flush`], which writes each of them once and then drops
/// every resident node. Between flushes, clean nodes are dropped whenever
/// the resident set reaches its capacity; dirty nodes are never evicted.
/// Transaction boundaries belong to the store, not to the persister.
pub struct LazyPersister {
    store: Arc<dyn NodeStore>,
    resident: HashMap<NodeId, BTreeNode>,
    dirty: BTreeSet<NodeId>,
    capacity: usize,
    fetches: u64,
}

impl LazyPersister {
    /// Resident nodes kept by [`LazyPersister::new`] before clean ones are
    /// dropped.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Creates a persister over a node store.
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self::with_capacity(store, Self::DEFAULT_CAPACITY)
    }

    /// Creates a persister that keeps at most `capacity` clean nodes
    /// resident.
    pub fn with_capacity(store: Arc<dyn NodeStore>, capacity: usize) -> Self {
        Self {
            store,
            resident: HashMap::new(),
            dirty: BTreeSet::new(),
            capacity: capacity.max(1),
            fetches: 0,
        }
    }

    /// Number of node records read from the store so far.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches
    }

    /// Number of nodes currently resident.
    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    /// Number of nodes waiting to be written.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    fn fetch(&mut self, id: NodeId) -> CoreResult<BTreeNode> {
        let bytes = self.store.read_record(RecordKind::Node, Oid::from(id))?;
        let mut node: BTreeNode = codec::decode(&bytes)?;
        node.set_id(id);
        self.fetches += 1;
        trace!(node = id.as_u64(), "fetched btree node");
        Ok(node)
    }

    fn evict_clean(&mut self) {
        let before = self.resident.len();
        let dirty = &self.dirty;
        self.resident.retain(|id, _| dirty.contains(id));
        trace!(evicted = before - self.resident.len(), "evicted clean btree nodes");
    }
}

impl fmt::Debug for LazyPersister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyPersister")
            .field("resident", &self.resident.len())
            .field("dirty", &self.dirty.len())
            .field("capacity", &self.capacity)
            .field("fetches", &self.fetches)
            .finish()
    }
}

impl NodePersister for LazyPersister {
    fn load(&mut self, id: NodeId) -> CoreResult<&BTreeNode> {
        if !self.resident.contains_key(&id) {
            let node = self.fetch(id)?;
            if self.resident.len() >= self.capacity {
                self.evict_clean();
            }
            self.resident.insert(id, node);
        }
        self.resident
            .get(&id)
            .ok_or_else(|| CoreError::node_not_found(id.as_u64()))
    }

    fn save(&mut self, mut node: BTreeNode) -> CoreResult<NodeId> {
        let id = match node.id() {
            Some(id) => id,
            None => {
                let id = NodeId::from(self.store.allocate_oid());
                node.set_id(id);
                id
            }
        };
        self.resident.insert(id, node);
        self.dirty.insert(id);
        Ok(id)
    }

    fn save_header(&mut self, id: Option<NodeId>, header: &TreeHeader) -> CoreResult<NodeId> {
        let id = match id {
            Some(id) => id,
            None => NodeId::from(self.store.allocate_oid()),
        };
        self.store.write_record(
            RecordKind::TreeHeader,
            Oid::from(id),
            codec::encode(header)?,
        )?;
        Ok(id)
    }

    fn load_header(&mut self, id: NodeId) -> CoreResult<TreeHeader> {
        let bytes = self
            .store
            .read_record(RecordKind::TreeHeader, Oid::from(id))?;
        codec::decode(&bytes)
    }

    fn flush(&mut self) -> CoreResult<()> {
        let pending: Vec<NodeId> = self.dirty.iter().copied().collect();
        for id in &pending {
            let node = self
                .resident
                .get(id)
                .ok_or_else(|| CoreError::node_not_found(id.as_u64()))?;
            self.store
                .write_record(RecordKind::Node, Oid::from(*id), codec::encode(node)?)?;
            self.dirty.remove(id);
        }
        if !pending.is_empty() {
            trace!(nodes = pending.len(), "flushed btree nodes");
        }
        self.store.sync()?;
        self.resident.clear();
        Ok(())
    }

    fn close(&mut self) -> CoreResult<()> {
        self.flush()
    }
}
