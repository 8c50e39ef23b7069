//! Core identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Object identifier.
///
/// Assigned once when a record is first persisted and never reused. OIDs
/// address stored objects, tree nodes and tree headers alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Oid(pub u64);

impl Oid {
    /// Creates an OID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oid:{}", self.0)
    }
}

/// Identifier of a B-tree node (or tree header) inside its persister.
///
/// For the lazy persister this is the OID of the node record; the in-memory
/// persister hands out its own sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Creates a node identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<Oid> for NodeId {
    fn from(oid: Oid) -> Self {
        Self(oid.0)
    }
}

impl From<NodeId> for Oid {
    fn from(id: NodeId) -> Self {
        Self(id.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Identifier of a class (object type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Creates a class identifier.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_node_id_conversion() {
        let oid = Oid::new(42);
        let node: NodeId = oid.into();
        assert_eq!(node.as_u64(), 42);
        assert_eq!(Oid::from(node), oid);
    }

    #[test]
    fn display() {
        assert_eq!(Oid::new(7).to_string(), "oid:7");
        assert_eq!(NodeId::new(3).to_string(), "node:3");
        assert_eq!(ClassId::new(1).to_string(), "class:1");
    }
}
