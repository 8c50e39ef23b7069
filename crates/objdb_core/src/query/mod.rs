//! Query planning and execution.
//!
//! A [`Query`] names a class and optionally a [`Criterion`], a single
//! object and an ordering. The [`QueryExecutionPlanner`] turns it into an
//! [`ExecutionPlan`]; the [`GenericQueryExecutor`] runs the plan, filters
//! every candidate against the full predicate and hands the matches inside
//! the requested [`Window`] to a [`ResultSink`].

mod criteria;
mod executor;
mod plan;
mod query;
mod sink;

pub use criteria::Criterion;
pub use executor::{Execution, GenericQueryExecutor, Window};
pub use plan::{ExecutionPlan, PlanKind, QueryExecutionPlanner};
pub use query::Query;
pub use sink::{CollectingSink, LazyObjects, Objects, ResultSink};
