//! # ObjDB Core
//!
//! Storage and indexing core of the ObjDB embedded object database.
//!
//! This crate provides:
//! - A disk-backed B-tree with one or many object identifiers per key,
//!   fed through a [`NodePersister`] that either keeps nodes in memory or
//!   fetches them lazily from the [`ObjectStore`]
//! - A structural [`BTreeValidator`] for engine-level invariant checks
//! - Class metadata with secondary indexes ([`ClassIndex`])
//! - A query planner and generic executor choosing between point lookups,
//!   index scans and full extent scans, with ordering and pagination
//!
//! Object introspection, transactions and aggregation live outside this
//! crate; the executor talks to them through [`ObjectReader`] and
//! [`ResultSink`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod btree;
mod codec;
mod config;
mod database;
mod error;
pub mod query;
pub mod schema;
pub mod store;
mod types;
mod value;

pub use btree::{
    BTree, BTreeNode, BTreeValidator, Direction, InMemoryPersister, LazyPersister, NodePersister,
    Slot, SlotValue, TreeHeader, TreeReport,
};
pub use config::{Config, InconsistencyPolicy};
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use query::{
    CollectingSink, Criterion, Execution, ExecutionPlan, GenericQueryExecutor, LazyObjects,
    Objects, PlanKind, Query, QueryExecutionPlanner, ResultSink, Window,
};
pub use schema::{ClassIndex, ClassInfo, Zone};
pub use store::{NodeStore, ObjectReader, ObjectRecord, ObjectStore, StoreStats};
pub use types::{ClassId, NodeId, Oid};
pub use value::{Row, Value};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
