//! Landmark-count heuristic.
//!
//! Fact landmarks are discovered once at construction by backchaining from
//! the goal: every goal fact is a landmark, and for a landmark not already
//! true in the initial state, any fact shared by the preconditions of all
//! of its relaxed-reachable achievers is a landmark too. The discovery
//! order is kept as a DAG edge `landmark -> shared precondition`.
//!
//! Evaluation walks that DAG from the unsatisfied goal landmarks, counting
//! unsatisfied landmarks and stopping below any landmark the state already
//! satisfies. The count is zero exactly on goal states. This is a
//! state-based approximation (it cannot tell whether a landmark was
//! achieved earlier on the path and undone), so the estimate is
//! satisficing, not admissible.

use crate::relaxation::Relaxation;
use crate::Heuristic;
use strider_task::{Task, VarVal};
use tracing::debug;

pub struct LandmarkCount {
    /// Landmark facts, indexed by landmark id.
    lms: Vec<VarVal>,
    /// `parents[l]` = landmarks that must hold before `l` can be achieved
    /// (shared achiever preconditions).
    parents: Vec<Vec<u32>>,
    /// Landmark ids of the goal facts.
    goals: Vec<u32>,
}

impl LandmarkCount {
    pub fn new(task: &Task) -> Self {
        let relax = Relaxation::from_task(task);
        let reachable = relax.reachable_from(&task.init);

        let init_facts: Vec<bool> = {
            let mut v = vec![false; relax.num_facts];
            for f in relax.state_facts(&task.init) {
                v[f] = true;
            }
            v
        };

        // fact id -> landmark id, u32::MAX = not a landmark (yet).
        fn intern(
            fact: usize,
            relax: &Relaxation,
            lm_of: &mut [u32],
            lms: &mut Vec<VarVal>,
            parents: &mut Vec<Vec<u32>>,
        ) -> u32 {
            if lm_of[fact] == u32::MAX {
                lm_of[fact] = lms.len() as u32;
                lms.push(relax.var_val(fact));
                parents.push(Vec::new());
            }
            lm_of[fact]
        }

        let mut lm_of = vec![u32::MAX; relax.num_facts];
        let mut lms = Vec::new();
        let mut parents: Vec<Vec<u32>> = Vec::new();

        let goals: Vec<u32> = relax
            .goal_facts
            .iter()
            .map(|&g| intern(g, &relax, &mut lm_of, &mut lms, &mut parents))
            .collect();

        let mut queue: Vec<usize> = relax.goal_facts.clone();
        let mut done = vec![false; relax.num_facts];
        while let Some(f) = queue.pop() {
            if done[f] {
                continue;
            }
            done[f] = true;

            // Backchaining stops at facts the initial state provides.
            if init_facts[f] {
                continue;
            }

            // Intersect the preconditions of all achievers that can fire at
            // all; an op with unreachable preconditions never achieves f.
            let mut shared: Option<Vec<usize>> = None;
            for &oi in &relax.achievers[f] {
                if !relax.ops[oi].pres.iter().all(|&p| reachable[p]) {
                    continue;
                }
                let pres = &relax.ops[oi].pres;
                shared = Some(match shared {
                    None => pres.clone(),
                    Some(prev) => prev.into_iter().filter(|p| pres.contains(p)).collect(),
                });
                if shared.as_ref().is_some_and(Vec::is_empty) {
                    break;
                }
            }

            let lm = lm_of[f];
            for p in shared.unwrap_or_default() {
                let parent = intern(p, &relax, &mut lm_of, &mut lms, &mut parents);
                if !parents[lm as usize].contains(&parent) {
                    parents[lm as usize].push(parent);
                }
                queue.push(p);
            }
        }

        debug!(landmarks = lms.len(), "landmark generation finished");
        Self {
            lms,
            parents,
            goals,
        }
    }

    pub fn num_landmarks(&self) -> usize {
        self.lms.len()
    }
}

impl Heuristic for LandmarkCount {
    fn evaluate(&self, _task: &Task, state: &[u16]) -> f64 {
        let unsatisfied = |lm: u32| {
            let (var, val) = self.lms[lm as usize];
            state[var] != val
        };

        let mut visited = vec![false; self.lms.len()];
        let mut stack: Vec<u32> = self.goals.iter().copied().filter(|&g| unsatisfied(g)).collect();
        let mut count = 0u64;
        while let Some(lm) = stack.pop() {
            if visited[lm as usize] {
                continue;
            }
            visited[lm as usize] = true;
            count += 1;
            // A satisfied parent can support this landmark as-is; only
            // unsatisfied parents still cost work.
            for &p in &self.parents[lm as usize] {
                if unsatisfied(p) {
                    stack.push(p);
                }
            }
        }
        count as f64
    }

    fn is_integral(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "landmark-count"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::chain_task;

    #[test]
    fn test_chain_landmarks() {
        // Every position of the chain is a landmark: pos=k is the sole
        // achiever precondition of pos=k+1.
        let t = chain_task(3);
        let h = LandmarkCount::new(&t);
        assert_eq!(h.num_landmarks(), 4); // pos=0..=3
        assert_eq!(h.evaluate(&t, &[0]), 3.0); // pos=1,2,3 still needed
        assert_eq!(h.evaluate(&t, &[2]), 1.0); // only pos=3 needed
        assert_eq!(h.evaluate(&t, &[3]), 0.0); // goal state
        assert!(h.is_integral());
    }

    #[test]
    fn test_zero_exactly_at_goal() {
        let t = chain_task(2);
        let h = LandmarkCount::new(&t);
        assert!(h.evaluate(&t, &[0]) > 0.0);
        assert_eq!(h.evaluate(&t, &[2]), 0.0);
    }

    #[test]
    fn test_unreachable_goal_still_counts() {
        let mut t = chain_task(2);
        t.ops.clear();
        let h = LandmarkCount::new(&t);
        assert!(h.evaluate(&t, &[0]) >= 1.0);
    }
}
