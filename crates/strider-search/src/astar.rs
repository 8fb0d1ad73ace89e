//! Sequential A*.
//!
//! Two concrete engines behind one entry point: when every operator cost
//! is integral and the heuristic declares itself integral, the open list is
//! a [`TwoLevelBucketPq`] over packed `(f, h)` keys with in-place
//! decrease/increase-key; otherwise a lazy-deletion binary heap over real
//! `(f, h)` pairs with an epsilon recheck. The goal test happens on pop,
//! so with a consistent admissible heuristic the returned plan is optimal.

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

/// Comparison tolerance for the real-valued engine.
const EPS: f64 = 1e-12;

/// How often (in main-loop iterations) the memory budget is sampled.
const MEM_CHECK_INTERVAL: u64 = 1024;

/// Run A* on `task` with heuristic `h`.
pub fn astar(
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
        "starting A*"
    );

    if integer {
        astar_int(task, h, ctx, params, check_mutex, s0)
    } else {
        astar_real(task, h, ctx, params, check_mutex, s0)
    }
}

struct MetaI {
    g: u32,
    h: u32,
    closed: bool,
}

fn astar_int(
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
    let mut meta = vec![MetaI {
        g: 0,
        h: h0,
        closed: false,
    }];

    let mut open = TwoLevelBucketPq::new();
    open.insert(0, pack_fh_asc(h0, h0));

    let mut work = s0;
    let mut undo = UndoLog::new();
    let mut iter = 0u64;

    while !open.is_empty() {
        if ctx.cpu_exceeded() {
            return SearchResult::unsolved(SearchStatus::TimedOut, stats);
        }
        iter += 1;
        if iter % MEM_CHECK_INTERVAL == 0 && ctx.mem_exceeded() {
            return SearchResult::unsolved(SearchStatus::MemoryLimit, stats);
        }

        let (u, key) = open.extract_min();
        let m = &meta[u as usize];
        // Stale entry: the node was improved after this key was assigned.
        if key != pack_fh_asc(m.g.saturating_add(m.h), m.h) {
            continue;
        }

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

        meta[u as usize].closed = true;
        stats.expanded += 1;
        if stats.expanded > params.max_expansions {
            return SearchResult::unsolved(SearchStatus::ExpansionLimit, stats);
        }

        let parent_state = nodes[u as usize].state.clone();
        let parent_g = meta[u as usize].g;
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

            let tentative_g = parent_g + round_cost(op.cost);

            match index_of.get(&*succ).copied() {
                None => {
                    let v = nodes.len() as u32;
                    let succ_state = succ.to_vec();
                    drop(succ);
                    nodes.push(SearchNode {
                        state: succ_state.clone(),
                        parent: Some(u),
                        op: Some(a as u32),
                    });
                    index_of.insert(succ_state, v);

                    let hv = round_h(h.evaluate(task, &nodes[v as usize].state));
                    stats.evaluated += 1;
                    meta.push(MetaI {
                        g: tentative_g,
                        h: hv,
                        closed: false,
                    });
                    open.insert(v, pack_fh_asc(tentative_g.saturating_add(hv), hv));
                }
                Some(v) => {
                    if tentative_g < meta[v as usize].g {
                        meta[v as usize].g = tentative_g;
                        nodes[v as usize].parent = Some(u);
                        nodes[v as usize].op = Some(a as u32);

                        let hv = round_h(h.evaluate(task, &nodes[v as usize].state));
                        stats.evaluated += 1;
                        meta[v as usize].h = hv;
                        let new_key = pack_fh_asc(tentative_g.saturating_add(hv), hv);

                        if meta[v as usize].closed {
                            if !params.reopen_closed {
                                stats.duplicates += 1;
                                continue;
                            }
                            meta[v as usize].closed = false;
                            stats.reopened += 1;
                            open.insert(v, new_key);
                        } else if let Some(cur_key) = open.key_of(v) {
                            match new_key.cmp(&cur_key) {
                                Ordering::Less => open.decrease_key(v, new_key),
                                Ordering::Greater => open.increase_key(v, new_key),
                                Ordering::Equal => {}
                            }
                        } else {
                            // Not open and not closed: its stale entry was
                            // already discarded, so reinsert.
                            open.insert(v, new_key);
                        }
                    } else {
                        stats.duplicates += 1;
                    }
                }
            }
        }
    }

    SearchResult::unsolved(SearchStatus::Exhausted, stats)
}

struct MetaD {
    g: f64,
    h: f64,
    closed: bool,
}

/// Heap entry for the real-valued engine; `Ord` is reversed so the binary
/// max-heap pops the smallest `(f, h)`.
struct RealEntry {
    f: f64,
    h: f64,
    id: u32,
}

impl PartialEq for RealEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for RealEntry {}
impl PartialOrd for RealEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for RealEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.id.cmp(&self.id))
    }
}

fn astar_real(
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
    let mut meta = vec![MetaD {
        g: 0.0,
        h: h0,
        closed: false,
    }];

    let mut open = BinaryHeap::new();
    open.push(RealEntry {
        f: h0,
        h: h0,
        id: 0,
    });

    let mut work = s0;
    let mut undo = UndoLog::new();
    let mut iter = 0u64;

    while let Some(cur) = open.pop() {
        if ctx.cpu_exceeded() {
            return SearchResult::unsolved(SearchStatus::TimedOut, stats);
        }
        iter += 1;
        if iter % MEM_CHECK_INTERVAL == 0 && ctx.mem_exceeded() {
            return SearchResult::unsolved(SearchStatus::MemoryLimit, stats);
        }

        let u = cur.id;
        let m = &meta[u as usize];
        // Lazy deletion: entries whose f drifted from the node's current
        // g + h were superseded.
        if (cur.f - (m.g + m.h)).abs() > EPS {
            continue;
        }

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

        meta[u as usize].closed = true;
        stats.expanded += 1;
        if stats.expanded > params.max_expansions {
            return SearchResult::unsolved(SearchStatus::ExpansionLimit, stats);
        }

        let parent_state = nodes[u as usize].state.clone();
        let parent_g = meta[u as usize].g;
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

            let tentative_g = parent_g + op.cost;

            match index_of.get(&*succ).copied() {
                None => {
                    let v = nodes.len() as u32;
                    let succ_state = succ.to_vec();
                    drop(succ);
                    nodes.push(SearchNode {
                        state: succ_state.clone(),
                        parent: Some(u),
                        op: Some(a as u32),
                    });
                    index_of.insert(succ_state, v);

                    let hv = h.evaluate(task, &nodes[v as usize].state);
                    stats.evaluated += 1;
                    meta.push(MetaD {
                        g: tentative_g,
                        h: hv,
                        closed: false,
                    });
                    open.push(RealEntry {
                        f: tentative_g + hv,
                        h: hv,
                        id: v,
                    });
                }
                Some(v) => {
                    if tentative_g + EPS < meta[v as usize].g {
                        meta[v as usize].g = tentative_g;
                        nodes[v as usize].parent = Some(u);
                        nodes[v as usize].op = Some(a as u32);

                        let hv = h.evaluate(task, &nodes[v as usize].state);
                        stats.evaluated += 1;
                        meta[v as usize].h = hv;

                        if meta[v as usize].closed {
                            if !params.reopen_closed {
                                stats.duplicates += 1;
                                continue;
                            }
                            meta[v as usize].closed = false;
                            stats.reopened += 1;
                        }
                        open.push(RealEntry {
                            f: tentative_g + hv,
                            h: hv,
                            id: v,
                        });
                    } else {
                        stats.duplicates += 1;
                    }
                }
            }
        }
    }

    SearchResult::unsolved(SearchStatus::Exhausted, stats)
}
