//! Bidirectional A*: forward A* plus backward regression, in alternating
//! turns within one thread.
//!
//! The backward front searches over *partial states* (one entry per
//! variable, possibly unknown), starting from the goal-partial state and
//! regressing through operators under add-based semantics. Whenever either
//! front inserts or improves a node it is scanned against the opposite
//! front; a forward state meets a backward partial when it agrees on every
//! variable the partial fixes. The cheapest meeting seen is kept.
//!
//! The heuristic only guides the forward front (the backward front runs
//! uniform-cost), so the combined plan is **not optimal in general**: the
//! engine returns the shortest meeting over the frontiers it actually
//! enumerated. A front that reaches its own terminal state (forward sees
//! the goal, backward covers the initial state) short-circuits into a pure
//! one-directional plan.

use crate::apply::{is_applicable, UndoGuard, UndoLog};
use crate::bucket::{pack_fh_asc, TwoLevelBucketPq};
use crate::context::SearchContext;
use crate::node::{extract_plan, round_cost, round_h, SearchNode};
use crate::result::{Params, SearchError, SearchResult, SearchStatus, Stats};
use ahash::RandomState;
use std::cmp::Ordering;
use std::collections::HashMap;
use strider_heuristics::Heuristic;
use strider_task::{plan_cost, Operator, State, Task};
use tracing::debug;

const MEM_CHECK_INTERVAL: u64 = 1024;

/// A backward state: a value per variable, `None` = unknown. Represents
/// every concrete state agreeing with all `Some` entries.
pub type PartialState = Vec<Option<u16>>;

/// The initial backward state: unknown everywhere except the goal literals.
pub fn goal_partial(task: &Task) -> PartialState {
    let mut partial = vec![None; task.num_vars()];
    for &(v, val) in &task.goal {
        partial[v] = Some(val);
    }
    partial
}

/// Does concrete `s` agree with every variable `partial` fixes?
pub fn satisfies(s: &[u16], partial: &[Option<u16>]) -> bool {
    partial
        .iter()
        .zip(s)
        .all(|(req, &have)| req.is_none_or(|want| want == have))
}

/// Regress `partial` through `op`: the partial state from which applying
/// `op` yields a state covered by `partial`. `None` when the operator
/// contradicts `partial` or contributes nothing to it.
pub fn regress(task: &Task, op: &Operator, partial: &[Option<u16>]) -> Option<PartialState> {
    debug_assert_eq!(partial.len(), task.num_vars());
    let mut prev: PartialState = partial.to_vec();

    // Every written post must be unknown or already equal in the partial,
    // and at least one must be concretely equal (otherwise the operator is
    // irrelevant here).
    let mut relevant = false;
    for pp in &op.pre_posts {
        if let Some(want) = partial[pp.var] {
            if want != pp.post {
                return None;
            }
            relevant = true;
        }
    }
    if !relevant {
        return None;
    }

    // Prevail literals hold on both sides of the operator.
    for &(v, val) in &op.prevail {
        if partial[v].is_some_and(|x| x != val) {
            return None;
        }
        if prev[v].is_some_and(|x| x != val) {
            return None;
        }
        prev[v] = Some(val);
    }

    // Effect conditions are not written by the effect, so they also hold
    // on both sides.
    for pp in &op.pre_posts {
        for &(cv, cval) in &pp.conds {
            if partial[cv].is_some_and(|x| x != cval) {
                return None;
            }
            if prev[cv].is_some_and(|x| x != cval) {
                return None;
            }
            prev[cv] = Some(cval);
        }
    }

    // Required prior values land on the predecessor side. A conflicting
    // concrete value is fatal unless it was merely the post copied over
    // from the partial, which the regression overwrites with `pre`.
    for pp in &op.pre_posts {
        if let Some(pre) = pp.pre {
            if let Some(before) = prev[pp.var] {
                if before != pre && partial[pp.var] != Some(before) {
                    return None;
                }
            }
            prev[pp.var] = Some(pre);
        }
    }

    debug_assert!(prev
        .iter()
        .enumerate()
        .all(|(v, val)| val.is_none_or(|x| x < task.vars[v].domain_size)));
    Some(prev)
}

struct BackNode {
    state: PartialState,
    parent: Option<u32>,
    op: Option<u32>,
}

struct MetaF {
    g: u32,
    h: u32,
    closed: bool,
}

struct MetaB {
    g: u32,
    closed: bool,
}

/// Operator sequence of a backward chain, already in execution order:
/// walking from a backward node towards the goal-partial root applies the
/// regressed operators in the order they are encountered.
fn backward_suffix(back_nodes: &[BackNode], from: u32) -> Vec<u32> {
    let mut ops = Vec::new();
    let mut cur = from;
    while let (Some(parent), Some(op)) =
        (back_nodes[cur as usize].parent, back_nodes[cur as usize].op)
    {
        ops.push(op);
        cur = parent;
    }
    ops
}

/// Run bidirectional A* on `task`.
///
/// Requires the integer fast path (integral costs and heuristic); other
/// tasks are a configuration error.
pub fn bidir_astar(
    task: &Task,
    h: &dyn Heuristic,
    ctx: &SearchContext,
    params: &Params,
) -> Result<SearchResult, SearchError> {
    if !(task.all_costs_integral() && h.is_integral()) {
        return Err(SearchError::NonIntegralBidirectional);
    }

    let mut stats = Stats::default();
    let s0 = task.init.clone();
    let g0 = goal_partial(task);

    if satisfies(&s0, &g0) {
        return Ok(SearchResult {
            status: SearchStatus::Solved,
            plan: Vec::new(),
            plan_cost: 0.0,
            stats,
        });
    }

    let check_mutex = ctx.mutex_mode.enabled_for(task);
    debug!(
        heuristic = h.name(),
        mutex_check = check_mutex,
        "starting bidirectional A*"
    );

    // Forward front.
    let mut fwd_nodes = vec![SearchNode::root(s0.clone())];
    let mut index_fwd: HashMap<State, u32, RandomState> = HashMap::default();
    index_fwd.insert(s0.clone(), 0);
    let h0 = round_h(h.evaluate(task, &s0));
    stats.evaluated += 1;
    let mut meta_fwd = vec![MetaF {
        g: 0,
        h: h0,
        closed: false,
    }];
    let mut open_fwd = TwoLevelBucketPq::new();
    open_fwd.insert(0, pack_fh_asc(h0, h0));

    // Backward front: uniform cost, keys pack (g, 0).
    let mut back_nodes = vec![BackNode {
        state: g0.clone(),
        parent: None,
        op: None,
    }];
    let mut index_bwd: HashMap<PartialState, u32, RandomState> = HashMap::default();
    index_bwd.insert(g0, 0);
    let mut meta_bwd = vec![MetaB {
        g: 0,
        closed: false,
    }];
    let mut open_bwd = TwoLevelBucketPq::new();
    open_bwd.insert(0, pack_fh_asc(0, 0));

    // Best meeting so far: (g_f + g_b, forward id, backward id).
    let mut best: Option<(u64, u32, u32)> = None;

    let mut work = s0.clone();
    let mut undo = UndoLog::new();
    let mut expand_forward = true;
    let mut iter = 0u64;
    let mut cap_hit = false;

    'search: while !open_fwd.is_empty() || !open_bwd.is_empty() {
        if ctx.cpu_exceeded() {
            return Ok(SearchResult::unsolved(SearchStatus::TimedOut, stats));
        }
        iter += 1;
        if iter % MEM_CHECK_INTERVAL == 0 && ctx.mem_exceeded() {
            return Ok(SearchResult::unsolved(SearchStatus::MemoryLimit, stats));
        }
        if stats.expanded > params.max_expansions {
            cap_hit = true;
            break 'search;
        }

        if expand_forward {
            // Pop until a live node is expanded or the front drains.
            while !open_fwd.is_empty() {
                let (u, key) = open_fwd.extract_min();
                let u_us = u as usize;
                if meta_fwd[u_us].closed {
                    continue;
                }
                let m = &meta_fwd[u_us];
                if key != pack_fh_asc(m.g.saturating_add(m.h), m.h) {
                    continue;
                }

                if task.is_goal(&fwd_nodes[u_us].state) {
                    let plan = extract_plan(&fwd_nodes, u);
                    let cost = plan_cost(task, &plan);
                    return Ok(SearchResult {
                        status: SearchStatus::Solved,
                        plan,
                        plan_cost: cost,
                        stats,
                    });
                }

                meta_fwd[u_us].closed = true;
                stats.expanded += 1;

                let parent_state = fwd_nodes[u_us].state.clone();
                let parent_g = meta_fwd[u_us].g;
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
                    let v = match index_fwd.get(&*succ).copied() {
                        None => {
                            let v = fwd_nodes.len() as u32;
                            let succ_state = succ.to_vec();
                            drop(succ);
                            fwd_nodes.push(SearchNode {
                                state: succ_state.clone(),
                                parent: Some(u),
                                op: Some(a as u32),
                            });
                            index_fwd.insert(succ_state, v);

                            let hv = round_h(h.evaluate(task, &fwd_nodes[v as usize].state));
                            stats.evaluated += 1;
                            meta_fwd.push(MetaF {
                                g: tentative_g,
                                h: hv,
                                closed: false,
                            });
                            open_fwd.insert(v, pack_fh_asc(tentative_g.saturating_add(hv), hv));
                            v
                        }
                        Some(v) => {
                            let v_us = v as usize;
                            if tentative_g < meta_fwd[v_us].g {
                                meta_fwd[v_us].g = tentative_g;
                                fwd_nodes[v_us].parent = Some(u);
                                fwd_nodes[v_us].op = Some(a as u32);

                                let hv = round_h(h.evaluate(task, &fwd_nodes[v_us].state));
                                stats.evaluated += 1;
                                meta_fwd[v_us].h = hv;
                                let new_key =
                                    pack_fh_asc(tentative_g.saturating_add(hv), hv);

                                if meta_fwd[v_us].closed {
                                    if !params.reopen_closed {
                                        stats.duplicates += 1;
                                        continue;
                                    }
                                    meta_fwd[v_us].closed = false;
                                    stats.reopened += 1;
                                    open_fwd.insert(v, new_key);
                                } else if let Some(cur_key) = open_fwd.key_of(v) {
                                    match new_key.cmp(&cur_key) {
                                        Ordering::Less => open_fwd.decrease_key(v, new_key),
                                        Ordering::Greater => open_fwd.increase_key(v, new_key),
                                        Ordering::Equal => {}
                                    }
                                } else {
                                    open_fwd.insert(v, new_key);
                                }
                                v
                            } else {
                                stats.duplicates += 1;
                                continue;
                            }
                        }
                    };

                    // New or improved forward state: scan the backward front.
                    let gv = meta_fwd[v as usize].g;
                    let sv = &fwd_nodes[v as usize].state;
                    for (b_id, bn) in back_nodes.iter().enumerate() {
                        if !satisfies(sv, &bn.state) {
                            continue;
                        }
                        let cand = gv as u64 + meta_bwd[b_id].g as u64;
                        if best.is_none_or(|(c, _, _)| cand < c) {
                            best = Some((cand, v, b_id as u32));
                            debug!(cost = cand, "fronts met (forward insert)");
                        }
                    }
                }
                break;
            }
        } else {
            while !open_bwd.is_empty() {
                let (u, _key) = open_bwd.extract_min();
                let u_us = u as usize;
                if meta_bwd[u_us].closed {
                    continue;
                }

                let su = back_nodes[u_us].state.clone();

                // The backward front covers the initial state: the chain
                // from here to the goal-partial root is a complete plan.
                if satisfies(&s0, &su) {
                    let plan = backward_suffix(&back_nodes, u);
                    let cost = plan_cost(task, &plan);
                    return Ok(SearchResult {
                        status: SearchStatus::Solved,
                        plan,
                        plan_cost: cost,
                        stats,
                    });
                }

                meta_bwd[u_us].closed = true;
                stats.expanded += 1;
                let parent_g = meta_bwd[u_us].g;

                for (a, op) in task.ops.iter().enumerate() {
                    let Some(prev) = regress(task, op, &su) else {
                        continue;
                    };
                    stats.generated += 1;

                    let tentative_g = parent_g + round_cost(op.cost);
                    let v = match index_bwd.get(&prev).copied() {
                        None => {
                            let v = back_nodes.len() as u32;
                            back_nodes.push(BackNode {
                                state: prev.clone(),
                                parent: Some(u),
                                op: Some(a as u32),
                            });
                            index_bwd.insert(prev, v);
                            meta_bwd.push(MetaB {
                                g: tentative_g,
                                closed: false,
                            });
                            open_bwd.insert(v, pack_fh_asc(tentative_g, 0));
                            v
                        }
                        Some(v) => {
                            let v_us = v as usize;
                            if tentative_g < meta_bwd[v_us].g {
                                meta_bwd[v_us].g = tentative_g;
                                back_nodes[v_us].parent = Some(u);
                                back_nodes[v_us].op = Some(a as u32);
                                let new_key = pack_fh_asc(tentative_g, 0);

                                if meta_bwd[v_us].closed {
                                    if !params.reopen_closed {
                                        stats.duplicates += 1;
                                        continue;
                                    }
                                    meta_bwd[v_us].closed = false;
                                    stats.reopened += 1;
                                    open_bwd.insert(v, new_key);
                                } else if let Some(cur_key) = open_bwd.key_of(v) {
                                    match new_key.cmp(&cur_key) {
                                        Ordering::Less => open_bwd.decrease_key(v, new_key),
                                        Ordering::Greater => open_bwd.increase_key(v, new_key),
                                        Ordering::Equal => {}
                                    }
                                } else {
                                    open_bwd.insert(v, new_key);
                                }
                                v
                            } else {
                                stats.duplicates += 1;
                                continue;
                            }
                        }
                    };

                    // New or improved backward partial: scan the forward front.
                    let gv = meta_bwd[v as usize].g;
                    let rv = &back_nodes[v as usize].state;
                    for (f_id, fnode) in fwd_nodes.iter().enumerate() {
                        if !satisfies(&fnode.state, rv) {
                            continue;
                        }
                        let cand = meta_fwd[f_id].g as u64 + gv as u64;
                        if best.is_none_or(|(c, _, _)| cand < c) {
                            best = Some((cand, f_id as u32, v));
                            debug!(cost = cand, "fronts met (backward insert)");
                        }
                    }
                }
                break;
            }
        }

        expand_forward = !expand_forward;
        if params.stop_on_first_meet && best.is_some() {
            break;
        }
    }

    if let Some((_, best_f, best_b)) = best {
        let mut plan = extract_plan(&fwd_nodes, best_f);
        plan.extend(backward_suffix(&back_nodes, best_b));
        let cost = plan_cost(task, &plan);
        return Ok(SearchResult {
            status: SearchStatus::Solved,
            plan,
            plan_cost: cost,
            stats,
        });
    }

    let status = if cap_hit {
        SearchStatus::ExpansionLimit
    } else {
        SearchStatus::Exhausted
    };
    Ok(SearchResult::unsolved(status, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;
    use strider_task::{PrePost, Variable};

    fn two_var_task() -> Task {
        Task {
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
            goal: vec![(0, 1)],
            ops: vec![],
            mutexes: vec![],
        }
    }

    fn simple_op(var: usize, pre: Option<u16>, post: u16) -> Operator {
        Operator {
            name: "o".into(),
            prevail: vec![],
            pre_posts: smallvec![PrePost {
                conds: smallvec![],
                var,
                pre,
                post,
            }],
            cost: 1.0,
        }
    }

    #[test]
    fn test_goal_partial_and_satisfies() {
        let t = two_var_task();
        let g = goal_partial(&t);
        assert_eq!(g, vec![Some(1), None]);
        assert!(satisfies(&[1, 0], &g));
        assert!(satisfies(&[1, 1], &g));
        assert!(!satisfies(&[0, 1], &g));
    }

    #[test]
    fn test_regress_contributing_op() {
        let t = two_var_task();
        let op = simple_op(0, Some(0), 1);
        let prev = regress(&t, &op, &[Some(1), None]).unwrap();
        assert_eq!(prev, vec![Some(0), None]);
    }

    #[test]
    fn test_regress_conflicting_post_fails() {
        let t = two_var_task();
        let op = simple_op(0, Some(1), 0); // writes a := 0, partial wants a = 1
        assert!(regress(&t, &op, &[Some(1), None]).is_none());
    }

    #[test]
    fn test_regress_irrelevant_op_fails() {
        let t = two_var_task();
        let op = simple_op(1, Some(0), 1); // writes b, partial fixes only a
        assert!(regress(&t, &op, &[Some(1), None]).is_none());
    }

    #[test]
    fn test_regress_injects_prevail() {
        let t = two_var_task();
        let mut op = simple_op(0, None, 1);
        op.prevail.push((1, 1));
        let prev = regress(&t, &op, &[Some(1), None]).unwrap();
        assert_eq!(prev, vec![Some(1), Some(1)]);
    }

    #[test]
    fn test_regress_prevail_conflict_fails() {
        let t = two_var_task();
        let mut op = simple_op(0, None, 1);
        op.prevail.push((1, 1));
        assert!(regress(&t, &op, &[Some(1), Some(0)]).is_none());
    }

    #[test]
    fn test_regress_pre_overwrites_post_value() {
        // Partial fixes var to the op's post; regression must rewrite it to
        // the op's pre rather than fail.
        let t = two_var_task();
        let op = simple_op(0, Some(0), 1);
        let prev = regress(&t, &op, &[Some(1), Some(0)]).unwrap();
        assert_eq!(prev[0], Some(0));
    }

    #[test]
    fn test_regress_injects_effect_condition() {
        let t = two_var_task();
        let mut op = simple_op(0, None, 1);
        op.pre_posts[0].conds.push((1, 1));
        // Add-based regression: with no pre clause the achieved value stays
        // in the predecessor, and the condition literal is injected.
        let prev = regress(&t, &op, &[Some(1), None]).unwrap();
        assert_eq!(prev, vec![Some(1), Some(1)]);
        assert!(regress(&t, &op, &[Some(1), Some(0)]).is_none());
    }
}
