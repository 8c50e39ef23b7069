//! Collaborator contracts consumed by the tree engine and the executor.

use crate::error::CoreResult;
use crate::types::{ClassId, Oid};
use crate::value::Row;
use objdb_storage::RecordKind;

/// Read access to stored objects, as needed by query execution.
pub trait ObjectReader {
    /// Returns the object following `oid` in its class extent.
    ///
    /// `None` marks the end of the chain.
    fn next_oid(&self, oid: Oid) -> CoreResult<Option<Oid>>;

    /// Returns the storage position of the newest version of `oid`.
    fn resolve_position(&self, oid: Oid) -> CoreResult<u64>;

    /// Returns the class `oid` was stored as.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::NotFound`] if `oid` is not an object.
    fn class_of(&self, oid: Oid) -> CoreResult<ClassId>;

    /// Reads the fields of `oid`.
    fn read_row(&self, oid: Oid) -> CoreResult<Row>;
}

/// Record I/O keyed by OID, as needed by the lazy node persister.
pub trait NodeStore: Send + Sync {
    /// Hands out a fresh OID. OIDs are never reused.
    fn allocate_oid(&self) -> Oid;

    /// Reads the payload of the newest record of `kind` stored under `oid`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::NotFound`] if there is none.
    fn read_record(&self, kind: RecordKind, oid: Oid) -> CoreResult<Vec<u8>>;

    /// Writes a new version of the record stored under `oid`.
    fn write_record(&self, kind: RecordKind, oid: Oid, payload: Vec<u8>) -> CoreResult<()>;

    /// Makes all written records durable.
    fn sync(&self) -> CoreResult<()>;
}
