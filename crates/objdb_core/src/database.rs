//! Database facade tying the store, classes, indexes and queries together.

use crate::btree::{BTree, BTreeValidator, LazyPersister};
use crate::codec;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::query::{
    CollectingSink, Execution, GenericQueryExecutor, LazyObjects, Objects, Query, ResultSink,
    Window,
};
use crate::schema::{ClassIndex, ClassInfo, Zone};
use crate::store::{NodeStore, ObjectReader, ObjectRecord, ObjectStore};
use crate::types::{ClassId, NodeId, Oid};
use crate::value::Row;
use objdb_storage::{FileBackend, MemoryBackend, RecordKind, StorageBackend};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Where the catalog record lives. Allocated OIDs start at 1.
const CATALOG_OID: Oid = Oid::new(0);

#[derive(Debug, Default, Serialize, Deserialize)]
struct Catalog {
    classes: Vec<ClassEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClassEntry {
    id: ClassId,
    name: String,
    extent: Zone,
    indexes: Vec<IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    name: String,
    fields: Vec<String>,
    header: NodeId,
}

/// An embedded object database.
///
/// Objects are rows stored per class in extent order. Indexes are B-trees
/// persisted in the same store as the objects and kept up to date on every
/// [`Database::store`]. Stored objects become part of the committed extent
/// on [`Database::commit`], which also writes every index tree and the
/// catalog.
///
/// ```rust
/// use objdb_core::{Criterion, Database, Query, Row, Window};
///
/// let mut db = Database::open_in_memory()?;
/// db.define_class("Person")?;
/// db.define_index("Person", "by_name", &["name"], false)?;
/// db.store("Person", Row::new().with("name", "ada").with("age", 36))?;
/// db.commit()?;
///
/// let query = Query::new("Person").filter(Criterion::equal("name", "ada"));
/// let exec = db.query(&query, Window::all())?;
/// assert!(exec.plan.use_index());
/// assert_eq!(exec.result.len(), 1);
/// # Ok::<(), objdb_core::CoreError>(())
/// ```
pub struct Database<B: StorageBackend + 'static> {
    config: Config,
    store: Arc<ObjectStore<B>>,
    classes: Vec<ClassInfo>,
}

impl Database<MemoryBackend> {
    /// Opens an empty database held in memory.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open(MemoryBackend::new(), Config::default())
    }
}

impl Database<FileBackend> {
    /// Opens or creates a database file.
    pub fn open_path(path: &Path, config: Config) -> CoreResult<Self> {
        Self::open(FileBackend::open(path)?, config)
    }
}

impl<B: StorageBackend + 'static> Database<B> {
    /// Opens a database over a backend, restoring classes and index trees
    /// from the last committed catalog.
    pub fn open(backend: B, config: Config) -> CoreResult<Self> {
        let store = Arc::new(ObjectStore::open(backend)?);
        let catalog: Catalog = if store.contains(RecordKind::Catalog, CATALOG_OID) {
            codec::decode(&store.read_record(RecordKind::Catalog, CATALOG_OID)?)?
        } else {
            Catalog::default()
        };

        let validator = BTreeValidator::from_config(&config);
        let mut classes = Vec::with_capacity(catalog.classes.len());
        for entry in catalog.classes {
            let mut class = ClassInfo::with_zone(entry.id, entry.name, entry.extent);
            for index in entry.indexes {
                let persister = LazyPersister::with_capacity(store.clone(), config.node_cache_size);
                let tree = BTree::load(persister, index.header, validator)?;
                class.add_index(ClassIndex::new(index.name, entry.id, index.fields, tree))?;
            }
            classes.push(class);
        }

        info!(classes = classes.len(), "database opened");
        Ok(Self {
            config,
            store,
            classes,
        })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying object store.
    #[must_use]
    pub fn object_store(&self) -> &Arc<ObjectStore<B>> {
        &self.store
    }

    /// Declares a class; declaring an existing class returns its id.
    pub fn define_class(&mut self, name: &str) -> CoreResult<ClassId> {
        if let Some(class) = self.class(name) {
            return Ok(class.id());
        }
        let next = u32::try_from(self.classes.len() + 1)
            .map_err(|_| CoreError::unsupported("too many classes"))?;
        let id = ClassId::new(next);
        self.classes.push(ClassInfo::new(id, name));
        debug!(class = name, %id, "class defined");
        Ok(id)
    }

    /// Looks up a class.
    #[must_use]
    pub fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.iter().find(|c| c.name() == name)
    }

    /// Declared classes.
    #[must_use]
    pub fn classes(&self) -> &[ClassInfo] {
        &self.classes
    }

    fn class_mut(&mut self, name: &str) -> CoreResult<&mut ClassInfo> {
        self.classes
            .iter_mut()
            .find(|c| c.name() == name)
            .ok_or_else(|| CoreError::ClassNotFound {
                name: name.to_string(),
            })
    }

    /// Looks up an index, mutably.
    pub fn index_mut(&mut self, class: &str, index: &str) -> CoreResult<&mut ClassIndex> {
        let class = self.class_mut(class)?;
        let class_name = class.name().to_string();
        class.index_mut(index).ok_or_else(|| {
            CoreError::unsupported(format!("class {class_name} has no index {index}"))
        })
    }

    /// Declares an index over `fields` of `class` and indexes the objects
    /// already stored.
    ///
    /// Nothing is written to the store unless the index is accepted.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ClassNotFound`] if the class is not declared
    /// - [`CoreError::UnsupportedOperation`] if the class already has an
    ///   index with that name
    /// - [`CoreError::UniqueViolation`] if `unique` is set and two existing
    ///   objects share a key
    pub fn define_index(
        &mut self,
        class: &str,
        name: &str,
        fields: &[&str],
        unique: bool,
    ) -> CoreResult<()> {
        let existing = self.extent(class)?;
        let validator = BTreeValidator::from_config(&self.config);
        let persister = self.persister();
        let degree = self.config.default_degree;

        let class = self.class_mut(class)?;
        if class.index(name).is_some() {
            return Err(CoreError::unsupported(format!(
                "class {} already has an index named {name}",
                class.name()
            )));
        }
        let tree = BTree::new(name, degree, unique, persister, validator)?;
        let mut index = ClassIndex::new(
            name,
            class.id(),
            fields.iter().map(|f| (*f).to_string()).collect(),
            tree,
        );

        for (oid, row) in existing {
            let key = index.key_for(&row);
            if unique {
                if let Some(holder) = index.tree_mut().search_unique(&key)? {
                    return Err(CoreError::UniqueViolation {
                        index: name.to_string(),
                        key: key.to_string(),
                        existing: holder,
                    });
                }
            }
            index.tree_mut().insert(key, oid)?;
        }
        index.tree_mut().flush()?;
        debug!(class = class.name(), index = name, size = index.size(), "index defined");
        class.add_index(index)
    }

    fn persister(&self) -> LazyPersister {
        LazyPersister::with_capacity(self.store.clone(), self.config.node_cache_size)
    }

    /// Every object of a class, in extent order.
    fn extent(&self, class: &str) -> CoreResult<Vec<(Oid, Row)>> {
        let class = self.class(class).ok_or_else(|| CoreError::ClassNotFound {
            name: class.to_string(),
        })?;
        let total = class.object_count();
        let mut out = Vec::new();
        let mut current = class.scan_start();
        while let Some(oid) = current {
            let record = self.store.read_object(oid)?;
            out.push((oid, record.row));
            if out.len() as u64 == total {
                break;
            }
            current = record.next;
        }
        if out.len() as u64 != total {
            return Err(CoreError::structural(format!(
                "class {}: extent chain holds {} of {total} objects",
                class.name(),
                out.len()
            )));
        }
        Ok(out)
    }

    /// Stores an object and adds it to every index of its class.
    ///
    /// Index entries are added before the object is written and linked into
    /// its extent. If an index insert fails, the object is not stored, but
    /// indexes updated before the failing one keep their new entry until the
    /// database is reopened from the last commit.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ClassNotFound`] if the class is not declared
    /// - [`CoreError::UniqueViolation`] if a unique index already holds the
    ///   object's key; nothing is written in that case
    pub fn store(&mut self, class: &str, row: Row) -> CoreResult<Oid> {
        let store = self.store.clone();
        let class = self.class_mut(class)?;

        for index in class.indexes_mut() {
            if !index.is_unique() {
                continue;
            }
            let key = index.key_for(&row);
            if let Some(holder) = index.tree_mut().search_unique(&key)? {
                return Err(CoreError::UniqueViolation {
                    index: index.name().to_string(),
                    key: key.to_string(),
                    existing: holder,
                });
            }
        }

        let oid = store.allocate_oid();
        for index in class.indexes_mut() {
            let key = index.key_for(&row);
            index.tree_mut().insert(key, oid)?;
        }

        let tail = match class.last_oid() {
            Some(tail) => Some((tail, store.read_object(tail)?)),
            None => None,
        };
        store.write_object(oid, &ObjectRecord::new(class.id(), row))?;
        if let Some((tail, mut previous)) = tail {
            previous.next = Some(oid);
            store.write_object(tail, &previous)?;
        }
        class.record_new(oid);
        Ok(oid)
    }

    /// Reads a stored object.
    pub fn read(&self, oid: Oid) -> CoreResult<Row> {
        self.store.read_row(oid)
    }

    /// Folds pending objects into the committed extents and persists every
    /// index tree and the catalog.
    pub fn commit(&mut self) -> CoreResult<()> {
        let mut catalog = Catalog::default();
        for class in &mut self.classes {
            class.commit();
            let mut indexes = Vec::with_capacity(class.indexes().len());
            for index in class.indexes_mut() {
                let header = index.tree_mut().flush()?;
                indexes.push(IndexEntry {
                    name: index.name().to_string(),
                    fields: index.fields().to_vec(),
                    header,
                });
            }
            catalog.classes.push(ClassEntry {
                id: class.id(),
                name: class.name().to_string(),
                extent: *class.committed(),
                indexes,
            });
        }

        self.store
            .write_record(RecordKind::Catalog, CATALOG_OID, codec::encode(&catalog)?)?;
        self.store.sync()?;
        debug!(classes = catalog.classes.len(), "committed");
        Ok(())
    }

    /// Runs a query, collecting rows.
    pub fn query(&mut self, query: &Query, window: Window) -> CoreResult<Execution<Objects>> {
        let sink = CollectingSink::rows().sorted(query.direction(), self.config.sort_degree);
        self.query_with_sink(query, window, sink)
    }

    /// Runs a query, collecting identifiers whose rows are read on demand.
    pub fn query_lazy(&mut self, query: &Query, window: Window) -> CoreResult<LazyObjects<'_>> {
        let sink = CollectingSink::identifiers().sorted(query.direction(), self.config.sort_degree);
        let exec = self.query_with_sink(query, window, sink)?;
        Ok(LazyObjects::new(exec.result.oids(), &*self.store))
    }

    /// Runs a query into a caller-provided sink.
    pub fn query_with_sink<S: ResultSink>(
        &mut self,
        query: &Query,
        window: Window,
        sink: S,
    ) -> CoreResult<Execution<S::Output>> {
        let class = self.classes.iter_mut().find(|c| c.name() == query.class());
        let executor = GenericQueryExecutor::new(self.config.clone(), &*self.store);
        executor.execute(query, class, window, sink)
    }

    /// Commits and syncs.
    pub fn close(mut self) -> CoreResult<()> {
        self.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Criterion;
    use crate::value::Value;
    use objdb_storage::{StorageError, StorageResult};
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A memory backend whose reads can be switched off.
    #[derive(Default)]
    struct UnreadableBackend {
        inner: MemoryBackend,
        failing: Arc<AtomicBool>,
    }

    impl StorageBackend for UnreadableBackend {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Io(io::Error::other("unreadable")));
            }
            self.inner.read_at(offset, len)
        }
        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            self.inner.append(data)
        }
        fn flush(&mut self) -> StorageResult<()> {
            self.inner.flush()
        }
        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }
        fn sync(&mut self) -> StorageResult<()> {
            self.inner.sync()
        }
    }

    fn people() -> Database<MemoryBackend> {
        let mut db = Database::open_in_memory().unwrap();
        db.define_class("Person").unwrap();
        for (name, age) in [("ada", 36), ("bob", 20), ("cy", 36), ("dee", 50)] {
            db.store("Person", Row::new().with("name", name).with("age", age))
                .unwrap();
        }
        db
    }

    #[test]
    fn define_class_is_idempotent() {
        let mut db = Database::open_in_memory().unwrap();
        let a = db.define_class("A").unwrap();
        let b = db.define_class("B").unwrap();
        assert_ne!(a, b);
        assert_eq!(db.define_class("A").unwrap(), a);
    }

    #[test]
    fn unknown_class_is_rejected_on_store() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.store("Nope", Row::new()),
            Err(CoreError::ClassNotFound { .. })
        ));
    }

    #[test]
    fn index_defined_after_objects_covers_them() {
        let mut db = people();
        db.define_index("Person", "by_age", &["age"], false).unwrap();
        assert_eq!(db.class("Person").unwrap().index("by_age").unwrap().size(), 4);

        let query = Query::new("Person").filter(Criterion::equal("age", 36));
        let exec = db.query(&query, Window::all()).unwrap();
        assert!(exec.plan.use_index());
        assert_eq!(exec.result.len(), 2);
    }

    #[test]
    fn unique_violation_writes_nothing() {
        let mut db = people();
        db.define_index("Person", "by_name", &["name"], true).unwrap();
        let before = db.object_store().stats().unwrap();

        let err = db
            .store("Person", Row::new().with("name", "bob").with("age", 99))
            .unwrap_err();
        assert!(matches!(err, CoreError::UniqueViolation { .. }));
        assert_eq!(db.object_store().stats().unwrap(), before);
        assert_eq!(db.class("Person").unwrap().object_count(), 4);
    }

    #[test]
    fn unique_index_over_duplicates_is_rejected() {
        let mut db = people();
        assert!(matches!(
            db.define_index("Person", "by_age", &["age"], true),
            Err(CoreError::UniqueViolation { .. })
        ));
    }

    #[test]
    fn reopen_restores_extent_and_indexes() {
        let mut db = people();
        db.define_index("Person", "by_age", &["age"], false).unwrap();
        db.commit().unwrap();
        let bytes = db.object_store().backend().data();

        let mut reopened = Database::open(MemoryBackend::with_data(bytes), Config::default()).unwrap();
        let class = reopened.class("Person").unwrap();
        assert_eq!(class.object_count(), 4);
        assert_eq!(class.index("by_age").unwrap().size(), 4);

        let query = Query::new("Person")
            .filter(Criterion::equal("age", 36))
            .order_by(["name"]);
        let exec = reopened.query(&query, Window::all()).unwrap();
        let names: Vec<Value> = exec.result.rows().iter().map(|r| r.get("name").clone()).collect();
        assert_eq!(names, vec![Value::from("ada"), Value::from("cy")]);

        let oid = reopened.store("Person", Row::new().with("name", "eve")).unwrap();
        assert!(oid > Oid::new(4));
        assert_eq!(reopened.class("Person").unwrap().object_count(), 5);
    }

    #[test]
    fn lazy_results_read_rows_on_demand() {
        let mut db = people();
        db.commit().unwrap();
        let lazy = db
            .query_lazy(&Query::new("Person").order_by(["age"]).descending(), Window::range(0, 4))
            .unwrap();
        assert_eq!(lazy.len(), 4);
        let first = lazy.get(0).unwrap().unwrap();
        assert_eq!(first.get("name"), &Value::from("dee"));
        assert!(lazy.get(9).unwrap().is_none());
        assert_eq!(lazy.iter().filter_map(Result::ok).count(), 4);
    }

    #[test]
    fn duplicate_index_name_writes_nothing() {
        let mut db = people();
        db.define_index("Person", "ix", &["age"], false).unwrap();
        let before = db.object_store().stats().unwrap();

        let err = db.define_index("Person", "ix", &["name"], false).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedOperation { .. }));
        assert_eq!(db.object_store().stats().unwrap(), before);
        assert_eq!(db.class("Person").unwrap().index("ix").unwrap().fields(), ["age"]);
    }

    #[test]
    fn failed_index_insert_leaves_extent_untouched() {
        let backend = UnreadableBackend::default();
        let failing = backend.failing.clone();
        let mut db = Database::open(backend, Config::default()).unwrap();
        db.define_class("Person").unwrap();
        db.define_index("Person", "by_age", &["age"], false).unwrap();
        for age in [20, 30] {
            db.store("Person", Row::new().with("age", age)).unwrap();
        }
        db.commit().unwrap();
        let before = db.object_store().stats().unwrap();

        failing.store(true, Ordering::SeqCst);
        let err = db.store("Person", Row::new().with("age", 40)).unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        failing.store(false, Ordering::SeqCst);

        assert_eq!(db.object_store().stats().unwrap(), before);
        let class = db.class("Person").unwrap();
        assert_eq!(class.object_count(), 2);
        assert_eq!(class.index("by_age").unwrap().size(), 2);

        let exec = db.query(&Query::new("Person"), Window::all()).unwrap();
        assert_eq!(exec.result.len(), 2);
    }

    #[test]
    fn small_node_cache_still_answers_queries() {
        let config = Config::new().default_degree(2).node_cache_size(4);
        let mut db = Database::open(MemoryBackend::new(), config).unwrap();
        db.define_class("Item").unwrap();
        db.define_index("Item", "by_bucket", &["bucket"], false).unwrap();
        for n in 0..120i64 {
            db.store("Item", Row::new().with("n", n).with("bucket", n % 6)).unwrap();
        }
        db.commit().unwrap();

        let index = db.class("Item").unwrap().index("by_bucket").unwrap();
        assert_eq!(index.tree().persister().resident_count(), 0);

        let query = Query::new("Item").filter(Criterion::equal("bucket", 5));
        let exec = db.query(&query, Window::all()).unwrap();
        assert!(exec.plan.use_index());
        assert_eq!(exec.result.len(), 20);
        let index = db.class("Item").unwrap().index("by_bucket").unwrap();
        assert!(index.tree().persister().resident_count() <= 4);
    }
}
