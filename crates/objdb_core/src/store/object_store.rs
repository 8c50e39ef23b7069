//! Record-log backed object store.

use crate::codec;
use crate::error::{CoreError, CoreResult};
use crate::store::traits::{NodeStore, ObjectReader};
use crate::types::{ClassId, Oid};
use crate::value::Row;
use objdb_storage::{Record, RecordKind, RecordLog, StorageBackend};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A stored object: its class, its fields and the link to the next object
/// of the same class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Owning class.
    pub class: ClassId,
    /// Next object in extent order.
    pub next: Option<Oid>,
    /// Field values.
    pub row: Row,
}

impl ObjectRecord {
    /// Creates a record at the tail of its extent.
    #[must_use]
    pub fn new(class: ClassId, row: Row) -> Self {
        Self {
            class,
            next: None,
            row,
        }
    }
}

/// Record counts by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Live object records.
    pub objects: u64,
    /// Live tree node records.
    pub nodes: u64,
    /// Live tree header records.
    pub headers: u64,
    /// Highest OID ever stored, if any.
    pub highest_oid: Option<u64>,
    /// Log size in bytes, superseded versions included.
    pub bytes: u64,
}

/// Object and node storage over an append-only record log.
///
/// Every write appends a new version of a record; the in-memory map points
/// each OID at its newest version. OIDs are handed out monotonically and
/// never reused; on reopen the counter resumes after the highest OID found
/// in the log.
pub struct ObjectStore<B: StorageBackend> {
    log: RwLock<RecordLog<B>>,
    /// OID -> (kind, offset of newest version)
    index: RwLock<HashMap<Oid, (RecordKind, u64)>>,
    next: AtomicU64,
}

impl<B: StorageBackend> ObjectStore<B> {
    /// Opens a store, rebuilding the record map from the log.
    pub fn open(backend: B) -> CoreResult<Self> {
        let log = RecordLog::new(backend);
        let mut index = HashMap::new();
        let mut highest = 0u64;

        for (offset, record) in log.scan()? {
            highest = highest.max(record.oid);
            index.insert(Oid::new(record.oid), (record.kind, offset));
        }

        Ok(Self {
            log: RwLock::new(log),
            index: RwLock::new(index),
            next: AtomicU64::new(highest + 1),
        })
    }

    /// Writes a new version of an object.
    pub fn write_object(&self, oid: Oid, object: &ObjectRecord) -> CoreResult<()> {
        self.write_record(RecordKind::Object, oid, codec::encode(object)?)
    }

    /// Reads the newest version of an object.
    pub fn read_object(&self, oid: Oid) -> CoreResult<ObjectRecord> {
        let bytes = self.read_record(RecordKind::Object, oid)?;
        codec::decode(&bytes)
    }

    /// Returns true if a record of `kind` is stored under `oid`.
    #[must_use]
    pub fn contains(&self, kind: RecordKind, oid: Oid) -> bool {
        matches!(self.index.read().get(&oid), Some((k, _)) if *k == kind)
    }

    /// OIDs holding a record of `kind`, ascending.
    #[must_use]
    pub fn oids_of(&self, kind: RecordKind) -> Vec<Oid> {
        let mut oids: Vec<Oid> = self
            .index
            .read()
            .iter()
            .filter(|(_, (k, _))| *k == kind)
            .map(|(oid, _)| *oid)
            .collect();
        oids.sort_unstable();
        oids
    }

    /// Summarizes the store contents.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        let bytes = self.log.read().size()?;
        let index = self.index.read();
        let mut stats = StoreStats {
            bytes,
            highest_oid: index.keys().map(|oid| oid.as_u64()).max(),
            ..StoreStats::default()
        };
        for (kind, _) in index.values() {
            match kind {
                RecordKind::Object => stats.objects += 1,
                RecordKind::Node => stats.nodes += 1,
                RecordKind::TreeHeader => stats.headers += 1,
                RecordKind::Catalog => {}
            }
        }
        Ok(stats)
    }

    /// Borrows the underlying backend.
    pub fn backend(&self) -> MappedRwLockReadGuard<'_, B> {
        RwLockReadGuard::map(self.log.read(), RecordLog::backend)
    }
}

fn kind_name(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Object => "object",
        RecordKind::Node => "node",
        RecordKind::TreeHeader => "tree header",
        RecordKind::Catalog => "catalog",
    }
}

impl<B: StorageBackend> NodeStore for ObjectStore<B> {
    fn allocate_oid(&self) -> Oid {
        Oid::new(self.next.fetch_add(1, Ordering::SeqCst))
    }

    fn read_record(&self, kind: RecordKind, oid: Oid) -> CoreResult<Vec<u8>> {
        let offset = match self.index.read().get(&oid) {
            Some((k, offset)) if *k == kind => *offset,
            _ => {
                return Err(CoreError::NotFound {
                    kind: kind_name(kind),
                    id: oid.as_u64(),
                })
            }
        };

        let record = self.log.read().read(offset)?;
        if record.kind != kind || record.oid != oid.as_u64() {
            return Err(CoreError::invalid_format(format!(
                "record at offset {offset} is {:?} {}, expected {:?} {oid}",
                record.kind, record.oid, kind
            )));
        }
        Ok(record.payload)
    }

    fn write_record(&self, kind: RecordKind, oid: Oid, payload: Vec<u8>) -> CoreResult<()> {
        let record = Record::new(kind, oid.as_u64(), payload);
        let mut log = self.log.write();
        let offset = log.append(&record)?;
        self.index.write().insert(oid, (kind, offset));
        self.next.fetch_max(oid.as_u64() + 1, Ordering::SeqCst);
        Ok(())
    }

    fn sync(&self) -> CoreResult<()> {
        self.log.write().sync()?;
        Ok(())
    }
}

impl<B: StorageBackend> ObjectReader for ObjectStore<B> {
    fn next_oid(&self, oid: Oid) -> CoreResult<Option<Oid>> {
        Ok(self.read_object(oid)?.next)
    }

    fn resolve_position(&self, oid: Oid) -> CoreResult<u64> {
        match self.index.read().get(&oid) {
            Some((RecordKind::Object, offset)) => Ok(*offset),
            _ => Err(CoreError::object_not_found(oid)),
        }
    }

    fn class_of(&self, oid: Oid) -> CoreResult<ClassId> {
        Ok(self.read_object(oid)?.class)
    }

    fn read_row(&self, oid: Oid) -> CoreResult<Row> {
        Ok(self.read_object(oid)?.row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use objdb_storage::{FileBackend, MemoryBackend};
    use tempfile::tempdir;

    fn person(name: &str, age: i64) -> ObjectRecord {
        ObjectRecord::new(
            ClassId::new(1),
            Row::new().with("name", name).with("age", age),
        )
    }

    #[test]
    fn oids_are_monotonic() {
        let store = ObjectStore::open(MemoryBackend::new()).unwrap();
        let a = store.allocate_oid();
        let b = store.allocate_oid();
        assert!(b > a);
        assert_eq!(a, Oid::new(1));
    }

    #[test]
    fn newest_version_wins() {
        let store = ObjectStore::open(MemoryBackend::new()).unwrap();
        let oid = store.allocate_oid();
        store.write_object(oid, &person("ada", 36)).unwrap();

        let mut updated = person("ada", 37);
        updated.next = Some(Oid::new(9));
        store.write_object(oid, &updated).unwrap();

        assert_eq!(store.read_object(oid).unwrap(), updated);
        assert_eq!(store.next_oid(oid).unwrap(), Some(Oid::new(9)));
        assert_eq!(store.stats().unwrap().objects, 1);
    }

    #[test]
    fn wrong_kind_is_not_found() {
        let store = ObjectStore::open(MemoryBackend::new()).unwrap();
        let oid = store.allocate_oid();
        store.write_object(oid, &person("bob", 20)).unwrap();

        assert!(matches!(
            store.read_record(RecordKind::Node, oid),
            Err(CoreError::NotFound { kind: "node", .. })
        ));
        assert!(matches!(
            store.resolve_position(Oid::new(77)),
            Err(CoreError::NotFound { kind: "object", id: 77 })
        ));
    }

    #[test]
    fn reopen_resumes_after_highest_oid() {
        let store = ObjectStore::open(MemoryBackend::new()).unwrap();
        for _ in 0..3 {
            let oid = store.allocate_oid();
            store.write_object(oid, &person("x", 1)).unwrap();
        }
        let bytes = store.backend().data();

        let reopened = ObjectStore::open(MemoryBackend::with_data(bytes)).unwrap();
        assert_eq!(reopened.allocate_oid(), Oid::new(4));
        assert_eq!(reopened.oids_of(RecordKind::Object).len(), 3);
        assert_eq!(reopened.read_row(Oid::new(2)).unwrap().get("name"), &Value::from("x"));
    }

    #[test]
    fn file_backed_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("objects.odb");
        {
            let store = ObjectStore::open(FileBackend::open(&path).unwrap()).unwrap();
            let oid = store.allocate_oid();
            store.write_object(oid, &person("cy", 50)).unwrap();
            store.sync().unwrap();
        }

        let store = ObjectStore::open(FileBackend::open(&path).unwrap()).unwrap();
        let row = store.read_row(Oid::new(1)).unwrap();
        assert_eq!(row.get("age"), &Value::Integer(50));
        assert!(store.resolve_position(Oid::new(1)).is_ok());
    }
}
