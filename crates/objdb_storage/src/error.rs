//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by backends and the record log.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// A record frame is malformed.
    #[error("corrupt record at offset {offset}: {message}")]
    CorruptRecord {
        /// Offset of the record frame.
        offset: u64,
        /// What was wrong with it.
        message: String,
    },

    /// A record's checksum does not match its contents.
    #[error("checksum mismatch at offset {offset}: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Offset of the record frame.
        offset: u64,
        /// Checksum found in the frame.
        stored: u32,
        /// Checksum computed over the frame.
        computed: u32,
    },

    /// The payload does not fit in a single frame.
    #[error("record payload too large: {len} bytes")]
    RecordTooLarge {
        /// Payload length in bytes.
        len: usize,
    },
}

impl StorageError {
    /// Creates a corrupt record error.
    pub fn corrupt(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            offset,
            message: message.into(),
        }
    }
}
