//! Storage backend trait definition.

use crate::error::StorageResult;

/// An append-only byte store.
///
/// Backends do not interpret the bytes they hold; framing belongs to
/// [`crate::RecordLog`]. Reads take `&self` so a log can be shared behind a
/// lock held only for the duration of a single call.
///
/// # Invariants
///
/// - `append` returns the offset the data starts at, which equals the
///   previous `size`
/// - `read_at` returns exactly the bytes previously appended at that offset
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range is not
    /// fully inside the store.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes.
    fn size(&self) -> StorageResult<u64>;

    /// Makes all appended data and metadata durable.
    fn sync(&mut self) -> StorageResult<()>;
}
