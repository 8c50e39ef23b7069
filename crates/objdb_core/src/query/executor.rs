//! The generic query executor.

use crate::config::{Config, InconsistencyPolicy};
use crate::error::{CoreError, CoreResult};
use crate::query::plan::{ExecutionPlan, PlanKind, QueryExecutionPlanner};
use crate::query::query::Query;
use crate::query::sink::ResultSink;
use crate::schema::{ClassIndex, ClassInfo};
use crate::store::ObjectReader;
use crate::types::Oid;
use crate::value::Value;
use tracing::{debug, warn};

/// Bounds on the positions, among matches, that are emitted.
///
/// Position `p` (0-based, in scan order) is emitted when
/// `start <= p < end`. Execution stops once `end` matches were seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    start: u64,
    end: Option<u64>,
}

impl Window {
    /// Every match.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            start: 0,
            end: None,
        }
    }

    /// Matches `start..end`.
    #[must_use]
    pub const fn range(start: u64, end: u64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// First emitted position.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Position after the last emitted one, if bounded.
    #[must_use]
    pub const fn end(&self) -> Option<u64> {
        self.end
    }

    fn contains(&self, position: u64) -> bool {
        position >= self.start && self.end.map_or(true, |end| position < end)
    }

    fn is_filled(&self, matches: u64) -> bool {
        self.end.is_some_and(|end| matches >= end)
    }
}

/// The output of one execution and the plan that produced it.
#[derive(Debug)]
pub struct Execution<T> {
    /// What the sink collected.
    pub result: T,
    /// The plan, with its measured duration.
    pub plan: ExecutionPlan,
}

/// How matches are handed to the sink; fixed once per execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Materialize {
    Identifiers,
    Rows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Runs queries: plans, enumerates candidates, filters and emits.
pub struct GenericQueryExecutor<'a> {
    config: Config,
    reader: &'a dyn ObjectReader,
}

impl<'a> GenericQueryExecutor<'a> {
    /// Creates an executor reading objects through `reader`.
    pub fn new(config: Config, reader: &'a dyn ObjectReader) -> Self {
        Self { config, reader }
    }

    /// Executes `query` against `class` and returns what `sink` collected.
    ///
    /// An unknown class (`None`) runs the empty plan: the sink is started
    /// and ended without matches.
    ///
    /// # Errors
    ///
    /// - [`CoreError::IndexCorruption`] if the chosen index holds a
    ///   different number of values than the class has objects; nothing
    ///   reaches the sink in that case.
    /// - [`CoreError::StructuralInconsistency`] if a full scan finds a
    ///   broken extent chain under [`InconsistencyPolicy::Strict`].
    pub fn execute<S: ResultSink>(
        &self,
        query: &Query,
        mut class: Option<&mut ClassInfo>,
        window: Window,
        mut sink: S,
    ) -> CoreResult<Execution<S::Output>> {
        let planner = QueryExecutionPlanner::new(self.config.clone());
        let mut plan = planner.plan(query, class.as_deref());
        let materialize = if sink.wants_rows() {
            Materialize::Rows
        } else {
            Materialize::Identifiers
        };

        plan.start();
        let mut emitter = Emitter {
            reader: self.reader,
            query,
            window,
            materialize,
            matches: 0,
            sink: &mut sink,
        };

        match (plan.kind().clone(), class.as_deref_mut()) {
            (PlanKind::Empty, _) | (_, None) => {
                emitter.sink.start()?;
            }
            (PlanKind::PointLookup(oid), Some(class)) => {
                emitter.sink.start()?;
                match self.reader.class_of(oid) {
                    Ok(id) if id == class.id() => {
                        emitter.offer(oid)?;
                    }
                    Ok(other) => {
                        debug!(%oid, %other, class = class.name(), "point lookup of another class");
                    }
                    Err(CoreError::NotFound { .. }) => {}
                    Err(err) => return Err(err),
                }
            }
            (PlanKind::IndexScan { index, key }, Some(class)) => {
                let candidates = index_candidates(class, &index, &key)?;
                debug!(class = class.name(), index = %index, candidates = candidates.len(), "index scan");
                emitter.sink.start()?;
                for oid in candidates {
                    if emitter.offer(oid)? == Flow::Stop {
                        break;
                    }
                }
            }
            (PlanKind::FullScan, Some(class)) => {
                emitter.sink.start()?;
                self.full_scan(class, &mut emitter)?;
            }
        }

        emitter.sink.end()?;
        plan.end();
        Ok(Execution {
            result: sink.collect()?,
            plan,
        })
    }

    fn full_scan<S: ResultSink>(&self, class: &ClassInfo, emitter: &mut Emitter<'_, S>) -> CoreResult<()> {
        let total = class.object_count();
        debug!(class = class.name(), total, "full scan");

        let mut current = class.scan_start();
        let mut previous: Option<Oid> = None;
        let mut visited = 0u64;

        while visited < total {
            let Some(oid) = current else {
                let message = format!(
                    "class {}: no object at position {visited} of {total}, previous {}",
                    class.name(),
                    previous.map_or_else(|| "none".to_string(), |oid| oid.to_string())
                );
                match self.config.inconsistency_policy {
                    InconsistencyPolicy::Strict => return Err(CoreError::structural(message)),
                    InconsistencyPolicy::Lenient => {
                        warn!(class = class.name(), visited, total, "extent chain broken, stopping scan");
                        return Ok(());
                    }
                }
            };

            visited += 1;
            if emitter.offer(oid)? == Flow::Stop {
                return Ok(());
            }
            previous = Some(oid);
            if visited < total {
                current = self.reader.next_oid(oid)?;
            }
        }
        Ok(())
    }
}

fn index_candidates(class: &mut ClassInfo, index: &str, key: &Value) -> CoreResult<Vec<Oid>> {
    let class_name = class.name().to_string();
    let class_count = class.object_count();
    let index: &mut ClassIndex = class.index_mut(index).ok_or_else(|| {
        CoreError::structural(format!("class {class_name} has no index {index}"))
    })?;

    if index.size() != class_count {
        return Err(CoreError::IndexCorruption {
            index: index.name().to_string(),
            class: class_name,
            class_count,
            index_count: index.size(),
        });
    }

    let tree = index.tree_mut();
    if tree.is_unique() {
        Ok(tree.search_unique(key)?.into_iter().collect())
    } else {
        tree.search_multiple(key)
    }
}

struct Emitter<'e, S: ResultSink> {
    reader: &'e dyn ObjectReader,
    query: &'e Query,
    window: Window,
    materialize: Materialize,
    matches: u64,
    sink: &'e mut S,
}

impl<S: ResultSink> Emitter<'_, S> {
    /// Filters one candidate and emits it if it falls in the window.
    fn offer(&mut self, oid: Oid) -> CoreResult<Flow> {
        self.reader.resolve_position(oid)?;

        let needs_row = self.materialize == Materialize::Rows
            || self.query.criterion().is_some()
            || self.query.has_order_by();
        let row = if needs_row {
            Some(self.reader.read_row(oid)?)
        } else {
            None
        };

        if let Some(row) = &row {
            if !self.query.matches(row) {
                return Ok(Flow::Continue);
            }
        }

        let position = self.matches;
        self.matches += 1;
        if self.window.contains(position) {
            let order_key = match (&row, self.query.has_order_by()) {
                (Some(row), true) => Some(self.query.order_key(row)),
                _ => None,
            };
            match (self.materialize, row) {
                (Materialize::Rows, Some(row)) => self.sink.row_match(oid, row, order_key)?,
                _ => self.sink.object_match(oid, order_key)?,
            }
        }

        if self.window.is_filled(self.matches) {
            Ok(Flow::Stop)
        } else {
            Ok(Flow::Continue)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CollectingSink, Criterion, Objects};
    use crate::types::ClassId;
    use crate::value::Row;
    use std::collections::HashMap;

    /// An extent held in memory; `links` may be broken on purpose.
    #[derive(Default)]
    struct FakeExtent {
        rows: HashMap<Oid, Row>,
        links: HashMap<Oid, Oid>,
        foreign: HashMap<Oid, ClassId>,
    }

    impl FakeExtent {
        fn chain(n: u64) -> (Self, ClassInfo) {
            let mut extent = Self::default();
            let mut class = ClassInfo::new(ClassId::new(1), "Item");
            for i in 1..=n {
                let oid = Oid::new(i);
                extent.rows.insert(oid, Row::new().with("n", i as i64).with("even", i % 2 == 0));
                if i > 1 {
                    extent.links.insert(Oid::new(i - 1), oid);
                }
                class.record_new(oid);
            }
            class.commit();
            (extent, class)
        }
    }

    impl ObjectReader for FakeExtent {
        fn class_of(&self, oid: Oid) -> CoreResult<ClassId> {
            if !self.rows.contains_key(&oid) {
                return Err(CoreError::object_not_found(oid));
            }
            Ok(self.foreign.get(&oid).copied().unwrap_or(ClassId::new(1)))
        }

        fn next_oid(&self, oid: Oid) -> CoreResult<Option<Oid>> {
            Ok(self.links.get(&oid).copied())
        }

        fn resolve_position(&self, oid: Oid) -> CoreResult<u64> {
            if self.rows.contains_key(&oid) {
                Ok(oid.as_u64())
            } else {
                Err(CoreError::object_not_found(oid))
            }
        }

        fn read_row(&self, oid: Oid) -> CoreResult<Row> {
            self.rows
                .get(&oid)
                .cloned()
                .ok_or_else(|| CoreError::object_not_found(oid))
        }
    }

    fn strict() -> Config {
        Config::default().inconsistency_policy(InconsistencyPolicy::Strict)
    }

    fn lenient() -> Config {
        Config::default().inconsistency_policy(InconsistencyPolicy::Lenient)
    }

    #[test]
    fn window_bounds_positions_among_matches() {
        let (extent, mut class) = FakeExtent::chain(100);
        let executor = GenericQueryExecutor::new(strict(), &extent);
        let query = Query::new("Item").filter(Criterion::equal("even", true));

        let exec = executor
            .execute(&query, Some(&mut class), Window::range(10, 20), CollectingSink::identifiers())
            .unwrap();
        let expected: Vec<Oid> = (11..=20).map(|i| Oid::new(i * 2)).collect();
        assert_eq!(exec.result, Objects::Identifiers(expected));
        assert_eq!(exec.plan.kind(), &PlanKind::FullScan);
    }

    #[test]
    fn strict_policy_fails_on_broken_chain() {
        let (mut extent, mut class) = FakeExtent::chain(10);
        extent.links.remove(&Oid::new(4));
        let executor = GenericQueryExecutor::new(strict(), &extent);

        let err = executor
            .execute(&Query::new("Item"), Some(&mut class), Window::all(), CollectingSink::identifiers())
            .unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, CoreError::StructuralInconsistency { .. }));
        assert!(text.contains("Item"));
        assert!(text.contains("4 of 10"));
        assert!(text.contains("oid:4"));
    }

    #[test]
    fn lenient_policy_returns_prefix() {
        let (mut extent, mut class) = FakeExtent::chain(10);
        extent.links.remove(&Oid::new(4));
        let executor = GenericQueryExecutor::new(lenient(), &extent);

        let exec = executor
            .execute(&Query::new("Item"), Some(&mut class), Window::all(), CollectingSink::identifiers())
            .unwrap();
        assert_eq!(exec.result.oids(), (1..=4).map(Oid::new).collect::<Vec<_>>());
    }

    #[test]
    fn stops_once_window_is_filled() {
        let (mut extent, mut class) = FakeExtent::chain(10);
        // Broken after the window closes: never reached.
        extent.links.remove(&Oid::new(6));
        let executor = GenericQueryExecutor::new(strict(), &extent);

        let exec = executor
            .execute(&Query::new("Item"), Some(&mut class), Window::range(0, 3), CollectingSink::rows())
            .unwrap();
        assert_eq!(exec.result.len(), 3);
    }

    #[test]
    fn scan_starts_from_uncommitted_zone() {
        let (extent, _) = FakeExtent::chain(5);
        let mut class = ClassInfo::new(ClassId::new(1), "Item");
        for i in 1..=5 {
            class.record_new(Oid::new(i));
        }
        let executor = GenericQueryExecutor::new(strict(), &extent);

        let exec = executor
            .execute(&Query::new("Item"), Some(&mut class), Window::all(), CollectingSink::identifiers())
            .unwrap();
        assert_eq!(exec.result.len(), 5);
    }

    #[test]
    fn ordered_scan_emits_one_key_per_match() {
        let (extent, mut class) = FakeExtent::chain(20);
        let executor = GenericQueryExecutor::new(strict(), &extent);
        let query = Query::new("Item")
            .filter(Criterion::greater_than("n", 10))
            .order_by(["n"])
            .descending();

        let exec = executor
            .execute(
                &query,
                Some(&mut class),
                Window::all(),
                CollectingSink::rows().sorted(query.direction(), 3),
            )
            .unwrap();
        let ns: Vec<i64> = exec
            .result
            .rows()
            .iter()
            .filter_map(|row| row.get("n").as_integer())
            .collect();
        assert_eq!(ns, (11..=20).rev().collect::<Vec<_>>());
    }

    #[test]
    fn point_lookup_filters_too() {
        let (extent, mut class) = FakeExtent::chain(5);
        let executor = GenericQueryExecutor::new(strict(), &extent);

        let hit = Query::new("Item").by_oid(Oid::new(2));
        let exec = executor
            .execute(&hit, Some(&mut class), Window::all(), CollectingSink::identifiers())
            .unwrap();
        assert_eq!(exec.result.oids(), vec![Oid::new(2)]);

        let miss = Query::new("Item")
            .by_oid(Oid::new(2))
            .filter(Criterion::equal("even", false));
        let exec = executor
            .execute(&miss, Some(&mut class), Window::all(), CollectingSink::identifiers())
            .unwrap();
        assert!(exec.result.is_empty());

        let absent = Query::new("Item").by_oid(Oid::new(99));
        let exec = executor
            .execute(&absent, Some(&mut class), Window::all(), CollectingSink::identifiers())
            .unwrap();
        assert!(exec.result.is_empty());
    }

    #[test]
    fn point_lookup_ignores_other_classes() {
        let (mut extent, mut class) = FakeExtent::chain(3);
        let invoice = Oid::new(50);
        extent.rows.insert(invoice, Row::new().with("amount", 99));
        extent.foreign.insert(invoice, ClassId::new(2));
        let executor = GenericQueryExecutor::new(strict(), &extent);

        let query = Query::new("Item").by_oid(invoice);
        let exec = executor
            .execute(&query, Some(&mut class), Window::all(), CollectingSink::rows())
            .unwrap();
        assert!(exec.result.is_empty());
        assert_eq!(exec.plan.kind(), &PlanKind::PointLookup(invoice));
    }

    #[test]
    fn unknown_class_runs_empty_plan() {
        let (extent, _) = FakeExtent::chain(3);
        let executor = GenericQueryExecutor::new(strict(), &extent);
        let exec = executor
            .execute(&Query::new("Ghost"), None, Window::all(), CollectingSink::rows())
            .unwrap();
        assert!(exec.result.is_empty());
        assert_eq!(exec.plan.details(), "empty plan");
        assert!(!exec.plan.use_index());
    }
}
