//! Plan selection.

use crate::config::Config;
use crate::query::query::Query;
use crate::schema::ClassInfo;
use crate::types::Oid;
use crate::value::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// How candidates are enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanKind {
    /// The class is unknown; nothing is enumerated.
    Empty,
    /// A single object named by the query.
    PointLookup(Oid),
    /// Objects found under `key` in the named index.
    IndexScan {
        /// Index name.
        index: String,
        /// Composite search key.
        key: Value,
    },
    /// Every object of the class, in extent order.
    FullScan,
}

/// The plan chosen for one query, with its timing once executed.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    kind: PlanKind,
    details: String,
    started: Option<Instant>,
    duration: Duration,
}

impl ExecutionPlan {
    fn new(kind: PlanKind, details: String) -> Self {
        Self {
            kind,
            details,
            started: None,
            duration: Duration::ZERO,
        }
    }

    /// The plan for an unknown class.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(PlanKind::Empty, "empty plan".to_string())
    }

    /// How candidates are enumerated.
    #[must_use]
    pub fn kind(&self) -> &PlanKind {
        &self.kind
    }

    /// Human readable description.
    #[must_use]
    pub fn details(&self) -> &str {
        &self.details
    }

    /// Time spent executing; zero until the plan ran.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns true if the plan reads an index.
    #[must_use]
    pub fn use_index(&self) -> bool {
        matches!(self.kind, PlanKind::IndexScan { .. })
    }

    /// Name of the index read, if any.
    #[must_use]
    pub fn index(&self) -> Option<&str> {
        match &self.kind {
            PlanKind::IndexScan { index, .. } => Some(index),
            _ => None,
        }
    }

    pub(crate) fn start(&mut self) {
        if self.kind != PlanKind::Empty {
            self.started = Some(Instant::now());
        }
    }

    pub(crate) fn end(&mut self) {
        if let Some(started) = self.started.take() {
            self.duration = started.elapsed();
        }
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.details, self.duration)
    }
}

/// Picks a plan for each query.
#[derive(Debug, Clone, Default)]
pub struct QueryExecutionPlanner {
    config: Config,
}

impl QueryExecutionPlanner {
    /// Creates a planner.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Chooses how `query` is executed against `class`.
    ///
    /// In order: an unknown class yields the empty plan; a query naming an
    /// object is a point lookup; when indexes are enabled, an index whose
    /// every field is pinned by an equality is scanned; otherwise the whole
    /// extent is scanned.
    #[must_use]
    pub fn plan(&self, query: &Query, class: Option<&ClassInfo>) -> ExecutionPlan {
        let Some(class) = class else {
            debug!(class = query.class(), "unknown class, empty plan");
            return ExecutionPlan::empty();
        };

        if let Some(oid) = query.oid() {
            debug!(class = class.name(), %oid, "point lookup");
            return ExecutionPlan::new(
                PlanKind::PointLookup(oid),
                format!("point lookup of {oid} in {}", class.name()),
            );
        }

        if self.config.use_index {
            if let Some(criterion) = query.criterion() {
                let values = criterion.equality_values();
                if let Some((index, key)) = class.index_covering(&values) {
                    debug!(class = class.name(), index = index.name(), "index scan");
                    return ExecutionPlan::new(
                        PlanKind::IndexScan {
                            index: index.name().to_string(),
                            key,
                        },
                        format!(
                            "index scan of {} using {}({})",
                            class.name(),
                            index.name(),
                            index.fields().join(",")
                        ),
                    );
                }
            }
        }

        debug!(class = class.name(), "full scan");
        ExecutionPlan::new(PlanKind::FullScan, format!("full scan of {}", class.name()))
    }
}
