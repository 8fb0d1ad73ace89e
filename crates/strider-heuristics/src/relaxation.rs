//! Delete-relaxation tables shared by h^FF and the landmark generator.
//!
//! The relaxation flattens every `(var, value)` pair into a fact id and
//! every operator into precondition/add-effect fact lists; delete effects
//! are dropped, so fact truth is monotone.

use strider_task::Task;
use tracing::debug;

/// An operator under the delete relaxation.
pub(crate) struct RelaxedOp {
    /// Deduplicated precondition facts: prevails, effect conditions, and
    /// `pre >= 0` clauses.
    pub pres: Vec<usize>,
    /// Facts this operator makes true.
    pub adds: Vec<usize>,
    pub cost: f64,
}

/// Fact/operator tables for the relaxed task.
pub(crate) struct Relaxation {
    /// Fact id of `(var, 0)`; `(var, val)` is `offsets[var] + val`.
    offsets: Vec<usize>,
    pub num_facts: usize,
    pub ops: Vec<RelaxedOp>,
    /// Per fact, the ops with that fact among their preconditions.
    pub consumers: Vec<Vec<usize>>,
    /// Per fact, the ops with that fact among their add effects.
    pub achievers: Vec<Vec<usize>>,
    pub goal_facts: Vec<usize>,
    pub costs_integral: bool,
}

impl Relaxation {
    pub fn from_task(task: &Task) -> Self {
        let mut offsets = Vec::with_capacity(task.num_vars());
        let mut num_facts = 0;
        for var in &task.vars {
            offsets.push(num_facts);
            num_facts += var.domain_size as usize;
        }
        let fact = |var: usize, val: u16| offsets[var] + val as usize;

        let mut ops = Vec::with_capacity(task.ops.len());
        for op in &task.ops {
            let mut pres: Vec<usize> = op
                .prevail
                .iter()
                .map(|&(v, val)| fact(v, val))
                .collect();
            for pp in &op.pre_posts {
                pres.extend(pp.conds.iter().map(|&(v, val)| fact(v, val)));
                if let Some(pre) = pp.pre {
                    pres.push(fact(pp.var, pre));
                }
            }
            pres.sort_unstable();
            pres.dedup();

            let mut adds: Vec<usize> =
                op.pre_posts.iter().map(|pp| fact(pp.var, pp.post)).collect();
            adds.sort_unstable();
            adds.dedup();

            ops.push(RelaxedOp {
                pres,
                adds,
                cost: op.cost,
            });
        }

        let mut consumers = vec![Vec::new(); num_facts];
        let mut achievers = vec![Vec::new(); num_facts];
        for (oi, op) in ops.iter().enumerate() {
            for &p in &op.pres {
                consumers[p].push(oi);
            }
            for &a in &op.adds {
                achievers[a].push(oi);
            }
        }

        let goal_facts = task.goal.iter().map(|&(v, val)| fact(v, val)).collect();
        let costs_integral = task.all_costs_integral();

        debug!(
            facts = num_facts,
            ops = ops.len(),
            "built delete-relaxation tables"
        );

        Self {
            offsets,
            num_facts,
            ops,
            consumers,
            achievers,
            goal_facts,
            costs_integral,
        }
    }

    #[inline]
    pub fn fact(&self, var: usize, val: u16) -> usize {
        self.offsets[var] + val as usize
    }

    /// Inverse of [`Self::fact`].
    pub fn var_val(&self, fact: usize) -> (usize, u16) {
        let var = self.offsets.partition_point(|&off| off <= fact) - 1;
        (var, (fact - self.offsets[var]) as u16)
    }

    /// Fact ids made true by a concrete state.
    pub fn state_facts<'a>(&'a self, state: &'a [u16]) -> impl Iterator<Item = usize> + 'a {
        state
            .iter()
            .enumerate()
            .map(move |(var, &val)| self.fact(var, val))
    }

    /// Facts reachable from `state` under the relaxation (plain fixpoint).
    pub fn reachable_from(&self, state: &[u16]) -> Vec<bool> {
        let mut reached = vec![false; self.num_facts];
        let mut queue = Vec::new();
        for f in self.state_facts(state) {
            if !reached[f] {
                reached[f] = true;
                queue.push(f);
            }
        }
        let mut remaining: Vec<usize> = self.ops.iter().map(|op| op.pres.len()).collect();

        // Ops with no preconditions fire unconditionally.
        for op in self.ops.iter().filter(|op| op.pres.is_empty()) {
            for &a in &op.adds {
                if !reached[a] {
                    reached[a] = true;
                    queue.push(a);
                }
            }
        }

        while let Some(f) = queue.pop() {
            for &oi in &self.consumers[f] {
                remaining[oi] -= 1;
                if remaining[oi] == 0 {
                    for &a in &self.ops[oi].adds {
                        if !reached[a] {
                            reached[a] = true;
                            queue.push(a);
                        }
                    }
                }
            }
        }
        reached
    }
}
