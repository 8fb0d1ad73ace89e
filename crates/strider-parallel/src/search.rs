//! Parallel shared-open-list A*.
//!
//! N workers run the same loop over a shared open list, a lock-striped
//! closed table, a lock-striped state store, and a lock-free id allocator.
//! Duplicate decisions happen exactly once, inside
//! [`ClosedTable::prune_or_update`]. Each worker goal-checks on pop; the
//! first to observe a goal posts it and stops the pool.
//!
//! **Optimality.** The global pop order is only approximately best-first
//! (exact per shard), so the posted goal is not guaranteed optimal in
//! general. With an admissible *consistent* heuristic and reopening
//! enabled, the found cost equals the sequential optimum — in particular,
//! runs with different worker counts agree on plan cost (the plans
//! themselves may differ).

use crate::closed::{ClosedTable, PruneDecision};
use crate::ids::IdAllocator;
use crate::open::{OpenKind, OpenNode, SharedOpen};
use crate::stats::{measure_ns, GlobalStats, ThreadStats};
use crate::store::StateStore;
use crate::sync::{set_current_thread_index, Backoff};
use crate::termination::{ActiveWorkers, Termination};
use dashmap::DashMap;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::time::Duration;
use strider_heuristics::Heuristic;
use strider_search::{is_applicable, MutexMode, SearchError, SearchStatus, UndoGuard, UndoLog, H_INF};
use strider_task::{plan_cost, State, Task};
use tracing::{debug, info};

/// Configuration of the worker pool and shared structures.
#[derive(Debug, Clone)]
pub struct ParallelParams {
    pub num_threads: u32,
    pub open_kind: OpenKind,
    /// Multi-queue variant: queue count (0 = derived from threads).
    pub num_queues: u32,
    /// Bucket variant: shard count (0 = derived from threads).
    pub num_shards: u32,
    /// k-choice sampling fan-out.
    pub k_select: u32,
    pub time_limit: Option<Duration>,
    pub reopen_closed: bool,
    pub mutex_mode: MutexMode,
    /// Base seed for the workers' shard-sampling RNGs.
    pub seed: u64,
}

impl Default for ParallelParams {
    fn default() -> Self {
        Self {
            num_threads: 1,
            open_kind: OpenKind::default(),
            num_queues: 0,
            num_shards: 0,
            k_select: 2,
            time_limit: None,
            reopen_closed: true,
            mutex_mode: MutexMode::default(),
            seed: 634,
        }
    }
}

impl ParallelParams {
    /// Fill derived defaults and clamp degenerate settings.
    pub fn sanitize(&mut self) {
        if self.num_threads == 0 {
            self.num_threads = 1;
        }
        if self.num_queues == 0 {
            self.num_queues = (2 * self.num_threads).max(2);
        }
        self.num_queues = self.num_queues.min(16 * self.num_threads);
        if self.num_shards == 0 {
            self.num_shards = self.num_threads.max(2);
        }
        if self.k_select == 0 {
            self.k_select = 2;
        }
    }
}

/// Outcome of a parallel run.
#[derive(Debug)]
pub struct ParallelResult {
    pub status: SearchStatus,
    pub plan: Vec<u32>,
    pub plan_cost: f64,
    /// All workers' counters folded together.
    pub stats: ThreadStats,
    pub per_thread: Vec<ThreadStats>,
}

impl ParallelResult {
    pub fn is_solved(&self) -> bool {
        self.status.is_solved()
    }
}

fn round_cost(cost: f64) -> u32 {
    cost.round() as u32
}

fn round_h(h: f64) -> u32 {
    if h.is_infinite() || h >= H_INF as f64 {
        H_INF
    } else {
        h.round().max(0.0) as u32
    }
}

/// Run parallel A* on `task` with heuristic `h`.
///
/// Requires the integer fast path (integral costs and heuristic) because
/// shard queues key on packed `(f, h)`.
pub fn astar_parallel(
    task: &Task,
    h: &dyn Heuristic,
    params: &ParallelParams,
) -> Result<ParallelResult, SearchError> {
    if !(task.all_costs_integral() && h.is_integral()) {
        return Err(SearchError::NonIntegralParallel);
    }

    let mut p = params.clone();
    p.sanitize();
    let n = p.num_threads;
    let check_mutex = p.mutex_mode.enabled_for(task);
    info!(
        threads = n,
        open_kind = ?p.open_kind,
        shards = p.num_shards,
        k_select = p.k_select,
        mutex_check = check_mutex,
        "starting parallel A*"
    );

    let ids = IdAllocator::new();
    let closed = ClosedTable::for_threads(n);
    let store = StateStore::for_threads(n);
    let open = SharedOpen::new(p.open_kind, p.num_queues, p.num_shards, p.k_select);
    let term = Termination::new(p.time_limit);
    let active = ActiveWorkers::new(n);
    // Node registry for plan reconstruction.
    let registry: DashMap<u64, OpenNode> = DashMap::new();

    let mut global = GlobalStats::new(n);

    // Root node.
    let root_id = ids.alloc();
    let (h0, root_ns) = measure_ns(|| h.evaluate(task, &task.init));
    global.per_thread[0].evaluated += 1;
    global.per_thread[0].h_eval_ns += root_ns;
    let root = OpenNode {
        id: root_id,
        g: 0,
        h: round_h(h0),
        op: None,
        parent: None,
    };
    store.put(root_id, task.init.clone());
    closed.prune_or_update(&task.init, 0, root_id, p.reopen_closed);
    registry.insert(root_id, root.clone());
    open.push(0, root);
    global.per_thread[0].pushes += 1;

    std::thread::scope(|scope| {
        for (tid, stats) in global.per_thread.iter_mut().enumerate() {
            let refs = WorkerRefs {
                task,
                h,
                ids: &ids,
                closed: &closed,
                store: &store,
                open: &open,
                term: &term,
                active: &active,
                registry: &registry,
            };
            let seed = p.seed ^ (tid as u64).wrapping_mul(0x9e3779b97f4a7c15);
            let reopen = p.reopen_closed;
            scope.spawn(move || {
                worker(tid as u32, seed, refs, stats, check_mutex, reopen);
            });
        }
    });

    let stats = global.sum();
    if let Some(goal_id) = term.goal() {
        let plan = reconstruct_plan(&registry, goal_id);
        let cost = plan_cost(task, &plan);
        debug!(cost, len = plan.len(), "parallel A* found a plan");
        return Ok(ParallelResult {
            status: SearchStatus::Solved,
            plan,
            plan_cost: cost,
            stats,
            per_thread: global.per_thread,
        });
    }

    let status = if term.timed_out() {
        SearchStatus::TimedOut
    } else {
        SearchStatus::Exhausted
    };
    Ok(ParallelResult {
        status,
        plan: Vec::new(),
        plan_cost: 0.0,
        stats,
        per_thread: global.per_thread,
    })
}

/// Shared references each worker borrows for the scope of the search.
struct WorkerRefs<'a> {
    task: &'a Task,
    h: &'a dyn Heuristic,
    ids: &'a IdAllocator,
    closed: &'a ClosedTable,
    store: &'a StateStore,
    open: &'a SharedOpen,
    term: &'a Termination,
    active: &'a ActiveWorkers,
    registry: &'a DashMap<u64, OpenNode>,
}

fn worker(
    tid: u32,
    seed: u64,
    refs: WorkerRefs<'_>,
    stats: &mut ThreadStats,
    check_mutex: bool,
    reopen: bool,
) {
    set_current_thread_index(tid);
    let WorkerRefs {
        task,
        h,
        ids,
        closed,
        store,
        open,
        term,
        active,
        registry,
    } = refs;

    let mut rng = SmallRng::seed_from_u64(seed);
    let mut cur_state: State = Vec::new();
    let mut work: State = Vec::new();
    let mut undo = UndoLog::new();
    let mut backoff = Backoff::new();
    let mut idle = false;

    loop {
        if term.is_done() {
            break;
        }
        if term.timed_out() {
            term.set_done();
            break;
        }

        let Some(popped) = open.pop(tid, &mut rng) else {
            if !idle {
                active.exit();
                idle = true;
            }
            // Termination predicate: globally empty and nobody active.
            // Confirm over a short backoff window so a producer that is
            // between alloc and push is not mistaken for quiescence.
            if open.is_empty() && active.count() == 0 {
                backoff.pause();
                if open.is_empty() && active.count() == 0 {
                    term.set_done();
                    break;
                }
            }
            backoff.snooze();
            continue;
        };
        if idle {
            active.enter();
            idle = false;
            backoff.reset();
        }

        stats.pops += 1;
        if popped.stolen {
            stats.steals += 1;
        }
        stats.bucket_pop_empty_probes += popped.empty_probes as u64;
        let cur = popped.node;

        if !store.copy_into(cur.id, &mut cur_state) {
            // Every pushed id has its state stored first; do not let a
            // broken invariant wedge the worker.
            debug_assert!(false, "popped node {} has no stored state", cur.id);
            continue;
        }

        if task.is_goal(&cur_state) {
            term.post_goal(cur.id);
            break;
        }
        stats.expanded += 1;

        work.clone_from(&cur_state);
        undo.clear();

        for (a, op) in task.ops.iter().enumerate() {
            if !is_applicable(op, &cur_state) {
                continue;
            }
            let succ = UndoGuard::apply(op, &mut work, &mut undo);
            if check_mutex && task.violates_mutex(&succ) {
                continue;
            }

            let nxt_id = ids.alloc();
            let nxt_g = cur.g + round_cost(op.cost);

            match closed.prune_or_update(&succ, nxt_g, nxt_id, reopen) {
                PruneDecision::Pruned => {
                    stats.duplicates_pruned += 1;
                    continue;
                }
                PruneDecision::Reopened => stats.reopened += 1,
                PruneDecision::Inserted => {}
            }
            stats.generated += 1;

            let (hv, ns) = measure_ns(|| h.evaluate(task, &succ));
            stats.evaluated += 1;
            stats.h_eval_ns += ns;

            let node = OpenNode {
                id: nxt_id,
                g: nxt_g,
                h: round_h(hv),
                op: Some(a as u32),
                parent: Some(cur.id),
            };
            store.put(nxt_id, succ.to_vec());
            registry.insert(nxt_id, node.clone());
            open.push(tid, node);
            stats.pushes += 1;
            stats.max_open_size_seen = stats.max_open_size_seen.max(open.len());
        }
    }

    if !idle {
        active.exit();
    }
}

/// Walk parent ids from the goal back to the root.
fn reconstruct_plan(registry: &DashMap<u64, OpenNode>, goal_id: u64) -> Vec<u32> {
    let mut ops = Vec::new();
    let mut cur = goal_id;
    while let Some(node) = registry.get(&cur) {
        let (Some(op), Some(parent)) = (node.op, node.parent) else {
            break;
        };
        ops.push(op);
        cur = parent;
    }
    ops.reverse();
    ops
}
