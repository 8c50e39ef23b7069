//! Property tests for the B-tree engine over both persisters.

use objdb_core::{
    BTree, BTreeValidator, Direction, InMemoryPersister, LazyPersister, NodePersister, NodeStore,
    ObjectStore, Oid, Value,
};
use objdb_storage::MemoryBackend;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn keys_strategy() -> impl Strategy<Value = BTreeSet<i64>> {
    prop::collection::btree_set(-10_000i64..10_000, 0..300)
}

/// Visits every node and checks the per-node shape.
fn check_shape<P: NodePersister>(tree: &mut BTree<P>) -> Result<(), TestCaseError> {
    let degree = tree.degree();
    let root = tree.root_id();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let node = tree.node(id).map_err(|e| TestCaseError::fail(e.to_string()))?.clone();
        if id != root {
            prop_assert!(node.key_count() >= degree - 1);
        }
        prop_assert!(node.key_count() <= 2 * degree - 1);
        if !node.is_leaf() {
            prop_assert_eq!(node.child_count(), node.key_count() + 1);
        }
        stack.extend(node.children().iter().copied());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn unique_keys_keep_invariants(keys in keys_strategy(), degree in 2usize..7) {
        let mut tree = BTree::new("p", degree, true, InMemoryPersister::new(), BTreeValidator::new(true)).unwrap();
        for k in &keys {
            tree.insert(Value::Integer(*k), Oid::new(*k as u64)).unwrap();
        }

        check_shape(&mut tree)?;
        let report = tree.validate().unwrap();
        prop_assert_eq!(report.keys as usize, keys.len());
        prop_assert_eq!(tree.size() as usize, keys.len());

        let in_order: Vec<i64> = tree
            .entries(Direction::Ascending)
            .unwrap()
            .iter()
            .filter_map(|slot| slot.key.as_integer())
            .collect();
        prop_assert_eq!(in_order, keys.iter().copied().collect::<Vec<_>>());
    }

    #[test]
    fn search_finds_every_inserted_value(
        pairs in prop::collection::vec((0i64..50, 1u64..1_000_000), 0..200),
        degree in 2usize..5,
    ) {
        let mut tree = BTree::new("p", degree, false, InMemoryPersister::new(), BTreeValidator::new(false)).unwrap();
        let mut expected: BTreeMap<i64, Vec<Oid>> = BTreeMap::new();
        for (k, oid) in &pairs {
            tree.insert(Value::Integer(*k), Oid::new(*oid)).unwrap();
            expected.entry(*k).or_default().push(Oid::new(*oid));
        }

        prop_assert_eq!(tree.size() as usize, pairs.len());
        for (k, oids) in &expected {
            prop_assert_eq!(&tree.search(&Value::Integer(*k)).unwrap(), oids);
        }
        tree.validate().unwrap();
    }

    #[test]
    fn lazy_tree_survives_reopen(keys in keys_strategy(), degree in 2usize..6) {
        let store = Arc::new(ObjectStore::open(MemoryBackend::new()).unwrap());
        let mut tree = BTree::new("lazy", degree, false, LazyPersister::new(store.clone()), BTreeValidator::new(false)).unwrap();
        for k in &keys {
            tree.insert(Value::Integer(*k), Oid::new(k.unsigned_abs() + 1)).unwrap();
        }
        let size = tree.size();
        let header = tree.close().unwrap();
        store.sync().unwrap();

        let bytes = store.backend().data();
        let reopened = Arc::new(ObjectStore::open(MemoryBackend::with_data(bytes)).unwrap());
        let mut tree = BTree::load(LazyPersister::new(reopened), header, BTreeValidator::new(false)).unwrap();

        prop_assert_eq!(tree.size(), size);
        for k in &keys {
            prop_assert_eq!(
                tree.search_multiple(&Value::Integer(*k)).unwrap(),
                vec![Oid::new(k.unsigned_abs() + 1)]
            );
        }
        prop_assert!(tree.search_multiple(&Value::Integer(20_000)).unwrap().is_empty());
    }
}
