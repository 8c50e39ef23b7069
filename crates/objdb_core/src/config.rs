//! Engine and executor configuration.

/// What a full scan does when the extent chain ends before the expected
/// number of objects was visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InconsistencyPolicy {
    /// Abort the query with a structural inconsistency error.
    Strict,
    /// Stop the scan and return what matched so far.
    Lenient,
}

/// Configuration consumed by the tree engine, planner and executor.
///
/// Passed explicitly to every component; nothing reads global state.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether the planner may choose an index scan.
    pub use_index: bool,

    /// Behavior on a broken extent chain during full scans.
    pub inconsistency_policy: InconsistencyPolicy,

    /// Whether the B-tree validator runs during inserts.
    pub validation_enabled: bool,

    /// Degree of index trees created by the database.
    pub default_degree: usize,

    /// Degree of the transient trees used to order query results.
    pub sort_degree: usize,

    /// Clean index nodes each tree keeps in memory between flushes.
    pub node_cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_index: true,
            inconsistency_policy: InconsistencyPolicy::Strict,
            validation_enabled: false,
            default_degree: 20,
            sort_degree: 10,
            node_cache_size: 1024,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether indexes may be used.
    #[must_use]
    pub const fn use_index(mut self, value: bool) -> Self {
        self.use_index = value;
        self
    }

    /// Sets the broken-chain policy.
    #[must_use]
    pub const fn inconsistency_policy(mut self, policy: InconsistencyPolicy) -> Self {
        self.inconsistency_policy = policy;
        self
    }

    /// Sets whether tree validation runs.
    #[must_use]
    pub const fn validation_enabled(mut self, value: bool) -> Self {
        self.validation_enabled = value;
        self
    }

    /// Sets the index tree degree.
    #[must_use]
    pub const fn default_degree(mut self, degree: usize) -> Self {
        self.default_degree = degree;
        self
    }

    /// Sets the order-by tree degree.
    #[must_use]
    pub const fn sort_degree(mut self, degree: usize) -> Self {
        self.sort_degree = degree;
        self
    }

    /// Sets how many clean nodes each index tree keeps resident.
    #[must_use]
    pub const fn node_cache_size(mut self, nodes: usize) -> Self {
        self.node_cache_size = nodes;
        self
    }
}
