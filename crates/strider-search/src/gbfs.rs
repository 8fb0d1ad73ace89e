//! Greedy best-first search.
//!
//! Satisficing semantics: duplicate states are detected by state identity
//! and never reopened on cost improvement. Two open tiers keyed `(h, g)`
//! hold the *preferred* successors (heuristic strictly improved over the
//! parent) and everything else; the preferred tier is drained first.

use crate::apply::{is_applicable, UndoGuard, UndoLog};
use crate::bucket::{pack_fh_asc, TwoLevelBucketPq};
use crate::context::SearchContext;
use crate::node::{extract_plan, round_cost, round_h, SearchNode};
use crate::result::{Params, SearchResult, SearchStatus, Stats};
use ahash::RandomState;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use strider_heuristics::Heuristic;
use strider_task::{plan_cost, State, Task};
use tracing::debug;

const MEM_CHECK_INTERVAL: u64 = 1024;

/// Run greedy best-first search on `task` with heuristic `h`.
pub fn gbfs(
    task: &Task,
    h: &dyn Heuristic,
    ctx: &SearchContext,
    params: &Params,
) -> SearchResult {
    let s0 = task.init.clone();
    if task.is_goal(&s0) {
        return SearchResult {
            status: SearchStatus::Solved,
            plan: Vec::new(),
            plan_cost: 0.0,
            stats: Stats::default(),
        };
    }

    let check_mutex = ctx.mutex_mode.enabled_for(task);
    let integer = task.all_costs_integral() && h.is_integral();
    debug!(
        heuristic = h.name(),
        integer,
        mutex_check = check_mutex,
        "starting GBFS"
    );

    if integer {
        gbfs_int(task, h, ctx, params, check_mutex, s0)
    } else {
        gbfs_real(task, h, ctx, params, check_mutex, s0)
    }
}

struct MetaI {
    g: u32,
    h: u32,
}

fn gbfs_int(
    task: &Task,
    h: &dyn Heuristic,
    ctx: &SearchContext,
    params: &Params,
    check_mutex: bool,
    s0: State,
) -> SearchResult {
    let mut stats = Stats::default();
    let mut nodes = vec![SearchNode::root(s0.clone())];
    let mut index_of: HashMap<State, u32, RandomState> = HashMap::default();
    index_of.insert(s0.clone(), 0);

    let h0 = round_h(h.evaluate(task, &s0));
    stats.evaluated += 1;
    let mut meta = vec![MetaI { g: 0, h: h0 }];

    // Keys pack (h, g): h-primary order, cheaper paths first among equals.
    let mut open_pref = TwoLevelBucketPq::new();
    let mut open_norm = TwoLevelBucketPq::new();
    open_norm.insert(0, pack_fh_asc(h0, 0));

    let mut work = s0;
    let mut undo = UndoLog::new();
    let mut iter = 0u64;

    while !open_pref.is_empty() || !open_norm.is_empty() {
        if ctx.cpu_exceeded() {
            return SearchResult::unsolved(SearchStatus::TimedOut, stats);
        }
        iter += 1;
        if iter % MEM_CHECK_INTERVAL == 0 && ctx.mem_exceeded() {
            return SearchResult::unsolved(SearchStatus::MemoryLimit, stats);
        }

        let (u, _key) = if !open_pref.is_empty() {
            open_pref.extract_min()
        } else {
            open_norm.extract_min()
        };

        if task.is_goal(&nodes[u as usize].state) {
            let plan = extract_plan(&nodes, u);
            let cost = plan_cost(task, &plan);
            return SearchResult {
                status: SearchStatus::Solved,
                plan,
                plan_cost: cost,
                stats,
            };
        }

        stats.expanded += 1;
        if stats.expanded > params.max_expansions {
            return SearchResult::unsolved(SearchStatus::ExpansionLimit, stats);
        }

        let parent_state = nodes[u as usize].state.clone();
        let parent_g = meta[u as usize].g;
        let parent_h = meta[u as usize].h;
        work.clone_from(&parent_state);
        undo.clear();

        for (a, op) in task.ops.iter().enumerate() {
            if !is_applicable(op, &parent_state) {
                continue;
            }

            let succ = UndoGuard::apply(op, &mut work, &mut undo);
            stats.generated += 1;
            if check_mutex && task.violates_mutex(&succ) {
                continue;
            }

            if index_of.contains_key(&*succ) {
                stats.duplicates += 1;
                continue;
            }

            let hv = round_h(h.evaluate(task, &succ));
            stats.evaluated += 1;
            let preferred = hv < parent_h;

            let v = nodes.len() as u32;
            let succ_state = succ.to_vec();
            drop(succ);
            nodes.push(SearchNode {
                state: succ_state.clone(),
                parent: Some(u),
                op: Some(a as u32),
            });
            index_of.insert(succ_state, v);

            let gv = parent_g.saturating_add(round_cost(op.cost));
            meta.push(MetaI { g: gv, h: hv });
            let key = pack_fh_asc(hv, gv);
            if preferred {
                open_pref.insert(v, key);
            } else {
                open_norm.insert(v, key);
            }
        }
    }

    SearchResult::unsolved(SearchStatus::Exhausted, stats)
}

struct MetaD {
    g: f64,
    h: f64,
}

/// Heap entry ordered by `(h, g)` ascending via reversed comparisons.
struct GreedyEntry {
    h: f64,
    g: f64,
    id: u32,
}

impl PartialEq for GreedyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for GreedyEntry {}
impl PartialOrd for GreedyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for GreedyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .h
            .total_cmp(&self.h)
            .then_with(|| other.g.total_cmp(&self.g))
            .then_with(|| other.id.cmp(&self.id))
    }
}

fn gbfs_real(
    task: &Task,
    h: &dyn Heuristic,
    ctx: &SearchContext,
    params: &Params,
    check_mutex: bool,
    s0: State,
) -> SearchResult {
    let mut stats = Stats::default();
    let mut nodes = vec![SearchNode::root(s0.clone())];
    let mut index_of: HashMap<State, u32, RandomState> = HashMap::default();
    index_of.insert(s0.clone(), 0);

    let h0 = h.evaluate(task, &s0);
    stats.evaluated += 1;
    let mut meta = vec![MetaD { g: 0.0, h: h0 }];

    let mut open_pref: BinaryHeap<GreedyEntry> = BinaryHeap::new();
    let mut open_norm: BinaryHeap<GreedyEntry> = BinaryHeap::new();
    open_norm.push(GreedyEntry {
        h: h0,
        g: 0.0,
        id: 0,
    });

    let mut work = s0;
    let mut undo = UndoLog::new();
    let mut iter = 0u64;

    while !open_pref.is_empty() || !open_norm.is_empty() {
        if ctx.cpu_exceeded() {
            return SearchResult::unsolved(SearchStatus::TimedOut, stats);
        }
        iter += 1;
        if iter % MEM_CHECK_INTERVAL == 0 && ctx.mem_exceeded() {
            return SearchResult::unsolved(SearchStatus::MemoryLimit, stats);
        }

        let cur = match open_pref.pop() {
            Some(entry) => entry,
            None => open_norm.pop().expect("loop guard ensures an entry"),
        };
        let u = cur.id;

        if task.is_goal(&nodes[u as usize].state) {
            let plan = extract_plan(&nodes, u);
            let cost = plan_cost(task, &plan);
            return SearchResult {
                status: SearchStatus::Solved,
                plan,
                plan_cost: cost,
                stats,
            };
        }

        stats.expanded += 1;
        if stats.expanded > params.max_expansions {
            return SearchResult::unsolved(SearchStatus::ExpansionLimit, stats);
        }

        let parent_state = nodes[u as usize].state.clone();
        let parent_g = meta[u as usize].g;
        let parent_h = meta[u as usize].h;
        work.clone_from(&parent_state);
        undo.clear();

        for (a, op) in task.ops.iter().enumerate() {
            if !is_applicable(op, &parent_state) {
                continue;
            }

            let succ = UndoGuard::apply(op, &mut work, &mut undo);
            stats.generated += 1;
            if check_mutex && task.violates_mutex(&succ) {
                continue;
            }

            if index_of.contains_key(&*succ) {
                stats.duplicates += 1;
                continue;
            }

            let hv = h.evaluate(task, &succ);
            stats.evaluated += 1;
            let preferred = hv < parent_h;

            let v = nodes.len() as u32;
            let succ_state = succ.to_vec();
            drop(succ);
            nodes.push(SearchNode {
                state: succ_state.clone(),
                parent: Some(u),
                op: Some(a as u32),
            });
            index_of.insert(succ_state, v);

            let gv = parent_g + op.cost;
            meta.push(MetaD { g: gv, h: hv });
            let entry = GreedyEntry { h: hv, g: gv, id: v };
            if preferred {
                open_pref.push(entry);
            } else {
                open_norm.push(entry);
            }
        }
    }

    SearchResult::unsolved(SearchStatus::Exhausted, stats)
}
