//! Error types for ObjDB core.

use crate::types::Oid;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in ObjDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend or record log error.
    #[error("storage error: {0}")]
    Storage(#[from] objdb_storage::StorageError),

    /// A record payload could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// The tree or an extent chain violates a structural invariant.
    ///
    /// Raised by the validator and by full scans that find a broken
    /// next-object link under the strict policy.
    #[error("structural inconsistency: {message}")]
    StructuralInconsistency {
        /// Description of the violation.
        message: String,
    },

    /// An index disagrees with the live object count of its class.
    #[error(
        "index {index} of class {class} is corrupted: class has {class_count} objects, index has {index_count}"
    )]
    IndexCorruption {
        /// Index name.
        index: String,
        /// Class name.
        class: String,
        /// Live objects in the class.
        class_count: u64,
        /// Values held by the index tree.
        index_count: u64,
    },

    /// A node, header or object is absent.
    #[error("{kind} {id} not found")]
    NotFound {
        /// What was looked up ("node", "object", ...).
        kind: &'static str,
        /// The identifier that was looked up.
        id: u64,
    },

    /// The operation does not apply to this object.
    #[error("unsupported operation: {message}")]
    UnsupportedOperation {
        /// Why the operation is not supported.
        message: String,
    },

    /// A unique index already holds the key.
    #[error("unique index {index} already contains key {key}")]
    UniqueViolation {
        /// Index name.
        index: String,
        /// Rendered key.
        key: String,
        /// Object currently holding the key.
        existing: Oid,
    },

    /// The class is not declared.
    #[error("class not found: {name}")]
    ClassNotFound {
        /// Class name.
        name: String,
    },

    /// A persisted record has an unexpected shape.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },
}

impl CoreError {
    /// Creates a structural inconsistency error.
    pub fn structural(message: impl Into<String>) -> Self {
        Self::StructuralInconsistency {
            message: message.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a not found error for a tree node.
    pub fn node_not_found(id: u64) -> Self {
        Self::NotFound { kind: "node", id }
    }

    /// Creates a not found error for a stored object.
    pub fn object_not_found(oid: Oid) -> Self {
        Self::NotFound {
            kind: "object",
            id: oid.as_u64(),
        }
    }

    /// Returns true for errors signalling engine-level corruption.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::StructuralInconsistency { .. } | Self::IndexCorruption { .. }
        )
    }
}
