//! Result sinks: where matches go.

use crate::btree::{BTree, BTreeValidator, Direction, InMemoryPersister};
use crate::error::CoreResult;
use crate::store::ObjectReader;
use crate::types::Oid;
use crate::value::{Row, Value};
use std::collections::HashMap;

/// Receives the matches of one execution.
///
/// The executor calls `start`, then one of the match methods per emitted
/// object, then `end`. Which match method is used is fixed for the whole
/// execution by [`ResultSink::wants_rows`]. An order key is passed exactly
/// when the query requested sorting; placing the object is up to the sink.
pub trait ResultSink {
    /// What the sink produces.
    type Output;

    /// Returns true if matches should carry their rows.
    fn wants_rows(&self) -> bool;

    /// Called once before the first match.
    fn start(&mut self) -> CoreResult<()>;

    /// A match without its row.
    fn object_match(&mut self, oid: Oid, order_key: Option<Value>) -> CoreResult<()>;

    /// A match with its row.
    fn row_match(&mut self, oid: Oid, row: Row, order_key: Option<Value>) -> CoreResult<()>;

    /// Called once after the last match.
    fn end(&mut self) -> CoreResult<()>;

    /// Produces the result.
    fn collect(self) -> CoreResult<Self::Output>;
}

/// Matched objects, with or without their rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Objects {
    /// Identifiers only.
    Identifiers(Vec<Oid>),
    /// Identifiers and rows.
    Rows(Vec<(Oid, Row)>),
}

impl Objects {
    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Objects::Identifiers(oids) => oids.len(),
            Objects::Rows(rows) => rows.len(),
        }
    }

    /// Returns true if nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifiers, in result order.
    #[must_use]
    pub fn oids(&self) -> Vec<Oid> {
        match self {
            Objects::Identifiers(oids) => oids.clone(),
            Objects::Rows(rows) => rows.iter().map(|(oid, _)| *oid).collect(),
        }
    }

    /// Rows, in result order; empty for identifier results.
    #[must_use]
    pub fn rows(&self) -> Vec<&Row> {
        match self {
            Objects::Identifiers(_) => Vec::new(),
            Objects::Rows(rows) => rows.iter().map(|(_, row)| row).collect(),
        }
    }
}

/// Collects matches in emission order, or by order key when keys are
/// given.
///
/// Keyed matches are placed into a transient in-memory multi-value tree,
/// so equal keys keep their emission order.
#[derive(Debug)]
pub struct CollectingSink {
    rows_wanted: bool,
    direction: Direction,
    sort_degree: usize,
    plain: Vec<Oid>,
    sorted: Option<BTree<InMemoryPersister>>,
    rows: HashMap<Oid, Row>,
}

impl CollectingSink {
    fn new(rows_wanted: bool) -> Self {
        Self {
            rows_wanted,
            direction: Direction::Ascending,
            sort_degree: 10,
            plain: Vec::new(),
            sorted: None,
            rows: HashMap::new(),
        }
    }

    /// A sink collecting identifiers and rows.
    #[must_use]
    pub fn rows() -> Self {
        Self::new(true)
    }

    /// A sink collecting identifiers only.
    #[must_use]
    pub fn identifiers() -> Self {
        Self::new(false)
    }

    /// Sets the direction and tree degree used for keyed matches.
    #[must_use]
    pub fn sorted(mut self, direction: Direction, degree: usize) -> Self {
        self.direction = direction;
        self.sort_degree = degree;
        self
    }

    fn place(&mut self, oid: Oid, order_key: Option<Value>) -> CoreResult<()> {
        let Some(key) = order_key else {
            self.plain.push(oid);
            return Ok(());
        };
        if self.sorted.is_none() {
            self.sorted = Some(BTree::new(
                "order-by",
                self.sort_degree,
                false,
                InMemoryPersister::new(),
                BTreeValidator::new(false),
            )?);
        }
        match self.sorted.as_mut() {
            Some(tree) => tree.insert(key, oid),
            None => Ok(()),
        }
    }
}

impl ResultSink for CollectingSink {
    type Output = Objects;

    fn wants_rows(&self) -> bool {
        self.rows_wanted
    }

    fn start(&mut self) -> CoreResult<()> {
        self.plain.clear();
        self.sorted = None;
        self.rows.clear();
        Ok(())
    }

    fn object_match(&mut self, oid: Oid, order_key: Option<Value>) -> CoreResult<()> {
        self.place(oid, order_key)
    }

    fn row_match(&mut self, oid: Oid, row: Row, order_key: Option<Value>) -> CoreResult<()> {
        self.rows.insert(oid, row);
        self.place(oid, order_key)
    }

    fn end(&mut self) -> CoreResult<()> {
        Ok(())
    }

    fn collect(mut self) -> CoreResult<Objects> {
        let mut oids = std::mem::take(&mut self.plain);
        if let Some(mut tree) = self.sorted.take() {
            for slot in tree.entries(self.direction)? {
                oids.extend_from_slice(slot.value.oids());
            }
        }

        if !self.rows_wanted {
            return Ok(Objects::Identifiers(oids));
        }
        let rows = oids
            .into_iter()
            .filter_map(|oid| self.rows.remove(&oid).map(|row| (oid, row)))
            .collect();
        Ok(Objects::Rows(rows))
    }
}

/// Identifiers whose rows are read only when asked for.
pub struct LazyObjects<'a> {
    oids: Vec<Oid>,
    reader: &'a dyn ObjectReader,
}

impl<'a> LazyObjects<'a> {
    /// Wraps identifiers and the reader that resolves them.
    pub fn new(oids: Vec<Oid>, reader: &'a dyn ObjectReader) -> Self {
        Self { oids, reader }
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.oids.len()
    }

    /// Returns true if nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.oids.is_empty()
    }

    /// Identifiers, in result order.
    #[must_use]
    pub fn oids(&self) -> &[Oid] {
        &self.oids
    }

    /// Reads the row at position `i`.
    pub fn get(&self, i: usize) -> CoreResult<Option<Row>> {
        self.oids
            .get(i)
            .map(|oid| self.reader.read_row(*oid))
            .transpose()
    }

    /// Reads every row, in result order.
    pub fn iter(&self) -> impl Iterator<Item = CoreResult<(Oid, Row)>> + '_ {
        self.oids
            .iter()
            .map(|oid| self.reader.read_row(*oid).map(|row| (*oid, row)))
    }
}

impl std::fmt::Debug for LazyObjects<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyObjects").field("oids", &self.oids).finish()
    }
}
