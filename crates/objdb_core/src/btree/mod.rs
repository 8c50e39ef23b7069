//! Disk-backed B-tree used for secondary indexes and result ordering.
//!
//! Nodes live in an arena owned by a [`NodePersister`] and refer to each
//! other by [`crate::NodeId`]: children by id, the parent by a non-owning
//! id. The tree itself only remembers its root id, so the same engine runs
//! over a fully resident tree ([`InMemoryPersister`]) or one fetched node by
//! node from the object store ([`LazyPersister`]).
//!
//! # Structure
//!
//! For degree `d`, every node except the root holds `d-1..=2d-1` slots, an
//! internal node has one more child than it has slots, and all leaves sit at
//! the same depth. Insertion is top-down: a full child is split before it
//! is entered, so a single root-to-leaf pass always suffices.

mod lazy;
mod node;
mod persister;
mod tree;
mod validator;

pub use lazy::LazyPersister;
pub use node::{BTreeNode, Slot, SlotValue};
pub use persister::{InMemoryPersister, NodePersister};
pub use tree::{BTree, Direction, TreeHeader};
pub use validator::{BTreeValidator, TreeReport};
