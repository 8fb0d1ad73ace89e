//! Search results, statistics, and parameters shared by all engines.

use thiserror::Error;

/// Node-accounting counters. Valid on every return path, whether the run
/// solved, exhausted, hit a cap, or timed out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Nodes popped and expanded.
    pub expanded: u64,
    /// Successors produced by operator application.
    pub generated: u64,
    /// Heuristic evaluations.
    pub evaluated: u64,
    /// Successors discarded as duplicates without improvement.
    pub duplicates: u64,
    /// Closed states moved back to open on a g-improvement.
    pub reopened: u64,
}

/// How a search run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// A plan was found.
    Solved,
    /// The open list ran dry without reaching a goal; the task is
    /// unsolvable from the initial state. Not an error.
    Exhausted,
    /// The expansion cap was hit; the result is incomplete.
    ExpansionLimit,
    /// The CPU (or wall-clock) budget was crossed.
    TimedOut,
    /// The resident-memory budget was crossed.
    MemoryLimit,
}

impl SearchStatus {
    pub fn is_solved(self) -> bool {
        matches!(self, SearchStatus::Solved)
    }

    /// Conventional planner exit code for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            SearchStatus::Solved => 0,
            SearchStatus::Exhausted => 1,
            SearchStatus::ExpansionLimit => 3,
            SearchStatus::TimedOut => 101,
            SearchStatus::MemoryLimit => 102,
        }
    }
}

/// Outcome of a sequential search run.
#[derive(Debug)]
pub struct SearchResult {
    pub status: SearchStatus,
    /// Operator indices from the initial state to a goal; empty unless
    /// `status.is_solved()` (and for a trivially satisfied goal).
    pub plan: Vec<u32>,
    pub plan_cost: f64,
    pub stats: Stats,
}

impl SearchResult {
    pub(crate) fn unsolved(status: SearchStatus, stats: Stats) -> Self {
        Self {
            status,
            plan: Vec::new(),
            plan_cost: 0.0,
            stats,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.status.is_solved()
    }
}

/// Engine parameters.
#[derive(Debug, Clone)]
pub struct Params {
    /// Stop after this many expansions with an incomplete result.
    pub max_expansions: u64,
    /// Whether a g-improvement moves a closed state back to open.
    pub reopen_closed: bool,
    /// Bidirectional only: stop at the first front meeting instead of
    /// draining both fronts.
    pub stop_on_first_meet: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_expansions: 1 << 62,
            reopen_closed: true,
            stop_on_first_meet: false,
        }
    }
}

/// A configuration the engine cannot run with.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("bidirectional search requires integral operator costs and an integral heuristic")]
    NonIntegralBidirectional,

    #[error("parallel search requires integral operator costs and an integral heuristic")]
    NonIntegralParallel,
}

impl SearchError {
    /// Process exit code for fatal configuration errors.
    pub fn exit_code(&self) -> i32 {
        9
    }
}
