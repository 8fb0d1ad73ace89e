//! h^FF: relaxed-plan heuristic.
//!
//! Runs an additive best-supporter exploration (h^add) over the delete
//! relaxation, then extracts a relaxed plan by backchaining from the goal
//! facts through each fact's best supporter. The estimate is the total cost
//! of the distinct operators in that plan; `INFINITY` when some goal fact is
//! relaxed-unreachable. Not admissible, but goal-aware and informative.

use crate::relaxation::Relaxation;
use crate::Heuristic;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use strider_task::Task;

pub struct FfHeuristic {
    relax: Relaxation,
}

/// Min-heap entry; `Ord` is reversed so `BinaryHeap::pop` yields the
/// cheapest fact.
struct QueueEntry {
    cost: f64,
    fact: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for QueueEntry {}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.fact.cmp(&self.fact))
    }
}

/// Sentinel supporter for facts true in the evaluated state.
const NO_SUPPORTER: usize = usize::MAX;

impl FfHeuristic {
    /// Build the relaxation tables for `task`. The heuristic must only be
    /// evaluated against states of this task.
    pub fn new(task: &Task) -> Self {
        Self {
            relax: Relaxation::from_task(task),
        }
    }
}

impl Heuristic for FfHeuristic {
    fn evaluate(&self, _task: &Task, state: &[u16]) -> f64 {
        let r = &self.relax;
        let mut cost = vec![f64::INFINITY; r.num_facts];
        let mut settled = vec![false; r.num_facts];
        let mut supporter = vec![NO_SUPPORTER; r.num_facts];
        let mut remaining: Vec<u32> = r.ops.iter().map(|op| op.pres.len() as u32).collect();
        let mut pre_sum = vec![0.0f64; r.ops.len()];
        let mut heap = BinaryHeap::new();

        for f in r.state_facts(state) {
            if cost[f] > 0.0 {
                cost[f] = 0.0;
                heap.push(QueueEntry { cost: 0.0, fact: f });
            }
        }
        // Ops without preconditions are applicable immediately.
        for (oi, op) in r.ops.iter().enumerate() {
            if op.pres.is_empty() {
                for &a in &op.adds {
                    if op.cost < cost[a] {
                        cost[a] = op.cost;
                        supporter[a] = oi;
                        heap.push(QueueEntry {
                            cost: op.cost,
                            fact: a,
                        });
                    }
                }
            }
        }

        while let Some(QueueEntry { cost: c, fact: f }) = heap.pop() {
            if settled[f] {
                continue;
            }
            settled[f] = true;
            for &oi in &r.consumers[f] {
                pre_sum[oi] += c;
                remaining[oi] -= 1;
                if remaining[oi] == 0 {
                    let val = r.ops[oi].cost + pre_sum[oi];
                    for &a in &r.ops[oi].adds {
                        if val < cost[a] {
                            cost[a] = val;
                            supporter[a] = oi;
                            heap.push(QueueEntry { cost: val, fact: a });
                        }
                    }
                }
            }
        }

        if r.goal_facts.iter().any(|&g| cost[g].is_infinite()) {
            return f64::INFINITY;
        }

        // Relaxed plan extraction: chase best supporters, counting each
        // operator's cost once.
        let mut needed = vec![false; r.num_facts];
        let mut marked = vec![false; r.ops.len()];
        let mut stack: Vec<usize> = r.goal_facts.clone();
        let mut total = 0.0;
        while let Some(f) = stack.pop() {
            if needed[f] {
                continue;
            }
            needed[f] = true;
            let oi = supporter[f];
            if oi == NO_SUPPORTER {
                continue; // true in the evaluated state
            }
            if !marked[oi] {
                marked[oi] = true;
                total += r.ops[oi].cost;
                stack.extend_from_slice(&r.ops[oi].pres);
            }
        }
        total
    }

    fn is_integral(&self) -> bool {
        self.relax.costs_integral
    }

    fn name(&self) -> &'static str {
        "ff"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::chain_task;
    use smallvec::smallvec;
    use strider_task::{Operator, PrePost, Variable};

    #[test]
    fn test_ff_on_chain() {
        let t = chain_task(3);
        let h = FfHeuristic::new(&t);
        assert_eq!(h.evaluate(&t, &[0]), 3.0);
        assert_eq!(h.evaluate(&t, &[2]), 1.0);
        assert_eq!(h.evaluate(&t, &[3]), 0.0);
        assert!(h.is_integral());
    }

    #[test]
    fn test_ff_unreachable_goal() {
        let mut t = chain_task(2);
        t.ops.clear();
        let h = FfHeuristic::new(&t);
        assert!(h.evaluate(&t, &[0]).is_infinite());
    }

    #[test]
    fn test_ff_counts_shared_achiever_once() {
        // One operator satisfies both goal literals; FF should cost it once.
        let t = Task {
            version: 3,
            metric: 1,
            vars: vec![
                Variable {
                    name: "a".into(),
                    domain_size: 2,
                },
                Variable {
                    name: "b".into(),
                    domain_size: 2,
                },
            ],
            init: vec![0, 0],
            goal: vec![(0, 1), (1, 1)],
            ops: vec![Operator {
                name: "both".into(),
                prevail: vec![],
                pre_posts: smallvec![
                    PrePost {
                        conds: smallvec![],
                        var: 0,
                        pre: Some(0),
                        post: 1,
                    },
                    PrePost {
                        conds: smallvec![],
                        var: 1,
                        pre: Some(0),
                        post: 1,
                    },
                ],
                cost: 4.0,
            }],
            mutexes: vec![],
        };
        let h = FfHeuristic::new(&t);
        assert_eq!(h.evaluate(&t, &[0, 0]), 4.0);
    }

    #[test]
    fn test_ff_non_integral_costs() {
        let mut t = chain_task(2);
        t.ops[0].cost = 0.5;
        assert!(!FfHeuristic::new(&t).is_integral());
    }
}
