//! CLI command implementations.

pub mod dump_tree;
pub mod inspect;
pub mod verify;

use objdb_core::{BTree, BTreeValidator, LazyPersister, NodeId, ObjectStore};
use objdb_storage::FileBackend;
use std::path::Path;
use std::sync::Arc;

/// Opens the object store of an existing database file.
pub fn open_store(path: &Path) -> Result<Arc<ObjectStore<FileBackend>>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No database found at {:?}", path).into());
    }
    Ok(Arc::new(ObjectStore::open(FileBackend::open(path)?)?))
}

/// Attaches to the tree whose header is stored under `header`.
pub fn open_tree(
    store: &Arc<ObjectStore<FileBackend>>,
    header: u64,
) -> Result<BTree<LazyPersister>, Box<dyn std::error::Error>> {
    let persister = LazyPersister::new(store.clone());
    Ok(BTree::load(persister, NodeId::new(header), BTreeValidator::new(false))?)
}
