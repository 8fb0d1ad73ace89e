//! Heuristic estimators over SAS+ states.
//!
//! A heuristic maps `(task, state)` to a nonnegative estimate of the
//! remaining cost to a goal, with `f64::INFINITY` for states it proves
//! unreachable. Engines ask `is_integral()` once at construction time to
//! decide whether the packed-key integer fast path applies.

pub mod ff;
pub mod landmarks;
mod relaxation;
pub mod strips;

pub use ff::FfHeuristic;
pub use landmarks::LandmarkCount;
pub use strips::{StripsBlind, StripsGoalCount, StripsHeuristic, WeightedStripsGoalCount};

use strider_task::Task;

/// The heuristic capability the search engines consume.
///
/// Implementations must be stateless with respect to `evaluate` (the
/// parallel engine shares one instance across workers), and must never
/// return a negative or NaN estimate.
pub trait Heuristic: Sync {
    /// Estimated cost from `state` to the nearest goal state.
    fn evaluate(&self, task: &Task, state: &[u16]) -> f64;

    /// True when every estimate this heuristic produces is integral,
    /// enabling the bucket-queue engines.
    fn is_integral(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str;
}

/// The zero heuristic. Admissible and consistent; turns A* into uniform
/// cost search.
pub struct Blind;

impl Heuristic for Blind {
    fn evaluate(&self, _task: &Task, _state: &[u16]) -> f64 {
        0.0
    }

    fn is_integral(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "blind"
    }
}

/// Number of unsatisfied goal literals. Not admissible in general (one
/// operator may satisfy several goals), but cheap and integral.
pub struct GoalCount;

impl Heuristic for GoalCount {
    fn evaluate(&self, task: &Task, state: &[u16]) -> f64 {
        task.goal
            .iter()
            .filter(|&&(v, val)| state[v] != val)
            .count() as f64
    }

    fn is_integral(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "goal-count"
    }
}

/// `weight × goal-count`.
pub struct WeightedGoalCount {
    weight: f64,
}

impl WeightedGoalCount {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Heuristic for WeightedGoalCount {
    fn evaluate(&self, task: &Task, state: &[u16]) -> f64 {
        self.weight * GoalCount.evaluate(task, state)
    }

    fn is_integral(&self) -> bool {
        self.weight.fract() == 0.0
    }

    fn name(&self) -> &'static str {
        "weighted-goal-count"
    }
}
