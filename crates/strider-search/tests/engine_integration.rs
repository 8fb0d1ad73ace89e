//! End-to-end scenarios for the sequential engines.

use smallvec::smallvec;
use strider_heuristics::{Blind, GoalCount, Heuristic};
use strider_search::{
    astar, bidir_astar, gbfs, MutexMode, Params, SearchContext, SearchError, SearchStatus,
};
use strider_task::{parse_sas, validate_task, MutexGroup, Operator, PrePost, Task, Variable};

fn var(name: &str, domain_size: u16) -> Variable {
    Variable {
        name: name.into(),
        domain_size,
    }
}

fn op(name: &str, var: usize, pre: Option<u16>, post: u16, cost: f64) -> Operator {
    Operator {
        name: name.into(),
        prevail: vec![],
        pre_posts: smallvec![PrePost {
            conds: smallvec![],
            var,
            pre,
            post,
        }],
        cost,
    }
}

fn switch_task() -> Task {
    Task {
        version: 3,
        metric: 1,
        vars: vec![var("switch", 2)],
        init: vec![0],
        goal: vec![(0, 1)],
        ops: vec![op("switch_on", 0, Some(0), 1, 1.0)],
        mutexes: vec![],
    }
}

/// Two routes to x=2: direct at cost 10, or two unit steps; then one more
/// step to the goal x=3.
fn detour_task() -> Task {
    Task {
        version: 3,
        metric: 1,
        vars: vec![var("x", 4)],
        init: vec![0],
        goal: vec![(0, 3)],
        ops: vec![
            op("expensive", 0, Some(0), 2, 10.0),
            op("step-a", 0, Some(0), 1, 1.0),
            op("step-b", 0, Some(1), 2, 1.0),
            op("finish", 0, Some(2), 3, 1.0),
        ],
        mutexes: vec![],
    }
}

/// Heuristic keyed on the first variable's value; integral.
struct TableH(Vec<f64>);

impl Heuristic for TableH {
    fn evaluate(&self, _task: &Task, state: &[u16]) -> f64 {
        self.0[state[0] as usize]
    }
    fn is_integral(&self) -> bool {
        true
    }
    fn name(&self) -> &'static str {
        "table"
    }
}

#[test]
fn test_switch_domain_astar() {
    let task = switch_task();
    let r = astar(&task, &Blind, &SearchContext::new(), &Params::default());
    assert_eq!(r.status, SearchStatus::Solved);
    assert_eq!(r.plan, vec![0]);
    assert_eq!(r.plan_cost, 1.0);
    assert!(r.stats.expanded >= 1);
    assert_eq!(r.status.exit_code(), 0);
}

#[test]
fn test_goal_already_satisfied() {
    let mut task = switch_task();
    task.init = vec![1];
    let r = astar(&task, &GoalCount, &SearchContext::new(), &Params::default());
    assert_eq!(r.status, SearchStatus::Solved);
    assert!(r.plan.is_empty());
    assert_eq!(r.plan_cost, 0.0);
    assert_eq!(r.stats.expanded, 0);
}

#[test]
fn test_unsolvable_task() {
    let mut task = switch_task();
    task.ops.clear();
    let r = astar(&task, &Blind, &SearchContext::new(), &Params::default());
    assert_eq!(r.status, SearchStatus::Exhausted);
    assert!(!r.is_solved());
    assert!(r.plan.is_empty());
    assert_eq!(r.status.exit_code(), 1);
}

#[test]
fn test_astar_blind_finds_optimum() {
    let task = detour_task();
    let r = astar(&task, &Blind, &SearchContext::new(), &Params::default());
    assert_eq!(r.status, SearchStatus::Solved);
    assert_eq!(r.plan_cost, 3.0);
    assert_eq!(r.plan, vec![1, 2, 3]);
}

#[test]
fn test_astar_real_mode_finds_optimum() {
    let mut task = detour_task();
    for o in &mut task.ops {
        o.cost /= 2.0;
    }
    let r = astar(&task, &Blind, &SearchContext::new(), &Params::default());
    assert_eq!(r.status, SearchStatus::Solved);
    assert_eq!(r.plan_cost, 1.5);
    assert_eq!(r.plan, vec![1, 2, 3]);
}

#[test]
fn test_inconsistent_heuristic_reopens() {
    let task = detour_task();
    // Makes the expensive route to x=2 pop first; the cheap route then
    // improves a closed state and must reopen it.
    let h = TableH(vec![0.0, 12.0, 0.0, 30.0]);

    let r = astar(&task, &h, &SearchContext::new(), &Params::default());
    assert_eq!(r.status, SearchStatus::Solved);
    assert_eq!(r.plan_cost, 3.0);
    assert!(r.stats.reopened >= 1);

    let no_reopen = Params {
        reopen_closed: false,
        ..Params::default()
    };
    let r = astar(&task, &h, &SearchContext::new(), &no_reopen);
    assert_eq!(r.status, SearchStatus::Solved);
    assert_eq!(r.plan_cost, 11.0);
    assert_eq!(r.stats.reopened, 0);
}

#[test]
fn test_expansion_cap() {
    let task = detour_task();
    let capped = Params {
        max_expansions: 0,
        ..Params::default()
    };
    let r = astar(&task, &Blind, &SearchContext::new(), &capped);
    assert_eq!(r.status, SearchStatus::ExpansionLimit);
    assert!(!r.is_solved());
    assert_eq!(r.status.exit_code(), 3);
}

#[test]
fn test_mutex_filter_prunes_goal_route() {
    // Goal wants both bits set, but a mutex group forbids exactly that.
    let mut task = Task {
        version: 3,
        metric: 1,
        vars: vec![var("a", 2), var("b", 2)],
        init: vec![0, 0],
        goal: vec![(0, 1), (1, 1)],
        ops: vec![op("set-a", 0, Some(0), 1, 1.0), op("set-b", 1, Some(0), 1, 1.0)],
        mutexes: vec![MutexGroup {
            lits: vec![(0, 1), (1, 1)],
        }],
    };

    let auto = SearchContext::new(); // auto: groups present, check on
    let r = astar(&task, &Blind, &auto, &Params::default());
    assert_eq!(r.status, SearchStatus::Exhausted);

    let off = SearchContext::new().with_mutex_mode(MutexMode::Off);
    let r = astar(&task, &Blind, &off, &Params::default());
    assert_eq!(r.status, SearchStatus::Solved);
    assert_eq!(r.plan_cost, 2.0);

    // With no groups declared, On and Auto differ.
    task.mutexes.clear();
    let on = SearchContext::new().with_mutex_mode(MutexMode::On);
    let r = astar(&task, &Blind, &on, &Params::default());
    assert_eq!(r.status, SearchStatus::Solved);
}

#[test]
fn test_gbfs_solves_chain() {
    let task = detour_task();
    let r = gbfs(&task, &GoalCount, &SearchContext::new(), &Params::default());
    assert_eq!(r.status, SearchStatus::Solved);
    // Satisficing: any plan reaching x=3 is acceptable.
    assert!(r.plan_cost >= 3.0);
    assert!(!r.plan.is_empty());
}

#[test]
fn test_gbfs_goal_already_satisfied() {
    let mut task = switch_task();
    task.init = vec![1];
    let r = gbfs(&task, &GoalCount, &SearchContext::new(), &Params::default());
    assert_eq!(r.status, SearchStatus::Solved);
    assert!(r.plan.is_empty());
}

#[test]
fn test_gbfs_unsolvable() {
    let mut task = switch_task();
    task.ops.clear();
    let r = gbfs(&task, &GoalCount, &SearchContext::new(), &Params::default());
    assert_eq!(r.status, SearchStatus::Exhausted);
}

#[test]
fn test_bidir_switch_domain() {
    let task = switch_task();
    let r = bidir_astar(&task, &Blind, &SearchContext::new(), &Params::default()).unwrap();
    assert_eq!(r.status, SearchStatus::Solved);
    assert_eq!(r.plan, vec![0]);
    assert_eq!(r.plan_cost, 1.0);
}

#[test]
fn test_bidir_goal_already_satisfied() {
    let mut task = switch_task();
    task.init = vec![1];
    let r = bidir_astar(&task, &Blind, &SearchContext::new(), &Params::default()).unwrap();
    assert_eq!(r.status, SearchStatus::Solved);
    assert!(r.plan.is_empty());
    assert_eq!(r.stats.expanded, 0);
}

#[test]
fn test_bidir_finds_valid_plan_on_detour() {
    let task = detour_task();
    let r = bidir_astar(&task, &Blind, &SearchContext::new(), &Params::default()).unwrap();
    assert_eq!(r.status, SearchStatus::Solved);

    // Replay the plan to confirm it reaches the goal.
    let mut s = task.init.clone();
    for &opi in &r.plan {
        let o = &task.ops[opi as usize];
        assert!(strider_search::is_applicable(o, &s), "inapplicable step");
        let mut undo = strider_search::UndoLog::new();
        strider_search::apply_inplace(o, &mut s, &mut undo);
    }
    assert!(task.is_goal(&s));
    assert_eq!(r.plan_cost, strider_task::plan_cost(&task, &r.plan));
}

#[test]
fn test_bidir_stop_on_first_meet() {
    let task = detour_task();
    let eager = Params {
        stop_on_first_meet: true,
        ..Params::default()
    };
    let r = bidir_astar(&task, &Blind, &SearchContext::new(), &eager).unwrap();
    assert_eq!(r.status, SearchStatus::Solved);
    assert!(!r.plan.is_empty());
}

#[test]
fn test_bidir_unsolvable() {
    let mut task = switch_task();
    task.ops.clear();
    let r = bidir_astar(&task, &Blind, &SearchContext::new(), &Params::default()).unwrap();
    assert_eq!(r.status, SearchStatus::Exhausted);
}

#[test]
fn test_bidir_rejects_non_integral_costs() {
    let mut task = switch_task();
    task.ops[0].cost = 0.5;
    let err = bidir_astar(&task, &Blind, &SearchContext::new(), &Params::default()).unwrap_err();
    assert!(matches!(err, SearchError::NonIntegralBidirectional));
    assert_eq!(err.exit_code(), 9);
}

#[test]
fn test_engines_agree_on_cost() {
    let task = detour_task();
    let ctx = SearchContext::new();
    let p = Params::default();
    let a = astar(&task, &Blind, &ctx, &p);
    let b = bidir_astar(&task, &Blind, &ctx, &p).unwrap();
    assert_eq!(a.status, SearchStatus::Solved);
    assert_eq!(b.status, SearchStatus::Solved);
    // Bidirectional makes no optimality promise, but on this task the
    // meeting scan sees the optimal route.
    assert_eq!(a.plan_cost, 3.0);
    assert!(b.plan_cost >= a.plan_cost);
}

#[test]
fn test_parse_validate_search_pipeline() {
    let text = "\
begin_version
3
end_version
begin_metric
0
end_metric
1
begin_variable
switch
-1
2
Atom off
Atom on
end_variable
begin_state
0
end_state
begin_goal
1
0 1
end_goal
begin_operator
switch_on
0
1
0 0 0 1
1
end_operator
0
";
    let task = parse_sas(text).unwrap();
    validate_task(&task).unwrap();
    let r = astar(&task, &GoalCount, &SearchContext::new(), &Params::default());
    assert_eq!(r.status, SearchStatus::Solved);
    assert_eq!(r.plan_cost, 1.0);
    assert_eq!(
        strider_task::plan_to_val(&task, &r.plan),
        "(switch_on)\n; cost = 1\n; length = 1\n"
    );
}

#[test]
fn test_stats_are_valid_on_every_status() {
    let task = detour_task();
    let r = astar(&task, &Blind, &SearchContext::new(), &Params::default());
    assert!(r.stats.generated >= r.stats.expanded);
    assert!(r.stats.evaluated >= 1);

    let capped = Params {
        max_expansions: 1,
        ..Params::default()
    };
    let r = astar(&task, &Blind, &SearchContext::new(), &capped);
    assert_eq!(r.status, SearchStatus::ExpansionLimit);
    assert!(r.stats.expanded >= 1);
    assert!(r.stats.evaluated >= 1);
}
