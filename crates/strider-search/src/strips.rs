//! A* over packed-bit STRIPS states.
//!
//! Same discipline as the real-valued SAS engine — lazy-deletion binary
//! heap, epsilon stale check, goal test on pop — but states are truth
//! vectors and successor generation writes into a reused bit buffer.

use crate::context::SearchContext;
use crate::result::{Params, SearchResult, SearchStatus, Stats};
use ahash::RandomState;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use strider_heuristics::StripsHeuristic;
use strider_task::{StripsState, StripsTask};
use tracing::debug;

const EPS: f64 = 1e-12;
const MEM_CHECK_INTERVAL: u64 = 1024;

struct StripsNode {
    state: StripsState,
    parent: Option<u32>,
    act: Option<u32>,
}

struct Meta {
    g: f64,
    h: f64,
    closed: bool,
}

struct Entry {
    f: f64,
    h: f64,
    id: u32,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.id.cmp(&self.id))
    }
}

fn extract_plan(nodes: &[StripsNode], goal_id: u32) -> Vec<u32> {
    let mut plan = Vec::new();
    let mut cur = goal_id;
    while let (Some(parent), Some(act)) = (nodes[cur as usize].parent, nodes[cur as usize].act) {
        plan.push(act);
        cur = parent;
    }
    plan.reverse();
    plan
}

/// Run A* on a STRIPS task.
pub fn astar_strips(
    task: &StripsTask,
    h: &dyn StripsHeuristic,
    ctx: &SearchContext,
    params: &Params,
) -> SearchResult {
    let mut stats = Stats::default();
    let s0 = task.make_init_state();

    if task.is_goal(&s0) {
        return SearchResult {
            status: SearchStatus::Solved,
            plan: Vec::new(),
            plan_cost: 0.0,
            stats,
        };
    }
    debug!(
        heuristic = h.name(),
        facts = task.num_facts(),
        actions = task.actions.len(),
        "starting STRIPS A*"
    );

    let mut nodes = vec![StripsNode {
        state: s0.clone(),
        parent: None,
        act: None,
    }];
    let mut index_of: HashMap<StripsState, u32, RandomState> = HashMap::default();
    index_of.insert(s0.clone(), 0);

    let h0 = h.evaluate(task, &s0);
    stats.evaluated += 1;
    let mut meta = vec![Meta {
        g: 0.0,
        h: h0,
        closed: false,
    }];

    let mut open = BinaryHeap::new();
    open.push(Entry {
        f: h0,
        h: h0,
        id: 0,
    });

    let mut succ = StripsState::with_facts(task.num_facts());
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
        if (cur.f - (m.g + m.h)).abs() > EPS {
            continue;
        }

        if task.is_goal(&nodes[u as usize].state) {
            let plan = extract_plan(&nodes, u);
            let cost = task.plan_cost(&plan);
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

        for (a, act) in task.actions.iter().enumerate() {
            if !act.applicable_in(&parent_state) {
                continue;
            }

            task.apply_into(&parent_state, act, &mut succ);
            stats.generated += 1;
            let tentative_g = parent_g + act.cost;

            match index_of.get(&succ).copied() {
                None => {
                    let v = nodes.len() as u32;
                    nodes.push(StripsNode {
                        state: succ.clone(),
                        parent: Some(u),
                        act: Some(a as u32),
                    });
                    index_of.insert(succ.clone(), v);

                    let hv = h.evaluate(task, &nodes[v as usize].state);
                    stats.evaluated += 1;
                    meta.push(Meta {
                        g: tentative_g,
                        h: hv,
                        closed: false,
                    });
                    open.push(Entry {
                        f: tentative_g + hv,
                        h: hv,
                        id: v,
                    });
                }
                Some(v) => {
                    if tentative_g + EPS < meta[v as usize].g {
                        meta[v as usize].g = tentative_g;
                        nodes[v as usize].parent = Some(u);
                        nodes[v as usize].act = Some(a as u32);

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
                        open.push(Entry {
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
