//! # ObjDB Storage
//!
//! The lowest layer of ObjDB: opaque byte backends and the record log
//! written on top of them.
//!
//! Backends know nothing about records. The [`RecordLog`] frames every
//! persisted object, tree node and tree header as
//!
//! ```text
//! | len (4) | kind (1) | oid (8) | payload (N) | crc32 (4) |
//! ```
//!
//! and is append-only: an update is a newer record carrying the same OID.
//!
//! ## Example
//!
//! ```rust
//! use objdb_storage::{MemoryBackend, Record, RecordKind, RecordLog};
//!
//! let mut log = RecordLog::new(MemoryBackend::new());
//! let offset = log.append(&Record::new(RecordKind::Object, 7, b"row".to_vec())).unwrap();
//! let record = log.read(offset).unwrap();
//! assert_eq!(record.oid, 7);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod record;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use record::{Record, RecordKind, RecordLog, RECORD_OVERHEAD};
