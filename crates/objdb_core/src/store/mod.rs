//! The storage-engine side of the core: object records, extent links and
//! node I/O for the lazy persister.

mod object_store;
mod traits;

pub use object_store::{ObjectRecord, ObjectStore, StoreStats};
pub use traits::{NodeStore, ObjectReader};
