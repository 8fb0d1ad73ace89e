//! Fail-fast task validation.
//!
//! Runs before any search loop so that range violations are reported with a
//! precise location instead of surfacing as indexing panics mid-search.

use crate::task::Task;
use thiserror::Error;

/// An inconsistency in the input task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("init has {init} values but the task declares {vars} variables")]
    InitSizeMismatch { init: usize, vars: usize },

    #[error("{location}: variable {var} out of range (task has {vars} variables)")]
    VarOutOfRange {
        location: String,
        var: usize,
        vars: usize,
    },

    #[error("{location}: value {val} out of range for variable {var} (domain size {domain})")]
    ValueOutOfRange {
        location: String,
        var: usize,
        val: u16,
        domain: u16,
    },

    #[error("operator '{op}' has negative cost {cost}")]
    NegativeCost { op: String, cost: f64 },
}

impl TaskError {
    /// Process exit code for fatal configuration errors.
    pub fn exit_code(&self) -> i32 {
        9
    }
}

/// Check every `(var, value)` reference in the task against the declared
/// variable count and domain sizes.
pub fn validate_task(task: &Task) -> Result<(), TaskError> {
    let nvars = task.num_vars();

    let chk_var = |var: usize, location: &dyn Fn() -> String| -> Result<(), TaskError> {
        if var >= nvars {
            return Err(TaskError::VarOutOfRange {
                location: location(),
                var,
                vars: nvars,
            });
        }
        Ok(())
    };
    let chk_val = |var: usize, val: u16, location: &dyn Fn() -> String| -> Result<(), TaskError> {
        chk_var(var, location)?;
        let domain = task.vars[var].domain_size;
        if val >= domain {
            return Err(TaskError::ValueOutOfRange {
                location: location(),
                var,
                val,
                domain,
            });
        }
        Ok(())
    };

    if task.init.len() != nvars {
        return Err(TaskError::InitSizeMismatch {
            init: task.init.len(),
            vars: nvars,
        });
    }
    for (var, &val) in task.init.iter().enumerate() {
        chk_val(var, val, &|| "init".to_string())?;
    }

    for &(var, val) in &task.goal {
        chk_val(var, val, &|| "goal".to_string())?;
    }

    for &(var, val) in task.mutexes.iter().flat_map(|g| &g.lits) {
        chk_val(var, val, &|| "mutex group".to_string())?;
    }

    for op in &task.ops {
        if op.cost < 0.0 || !op.cost.is_finite() {
            return Err(TaskError::NegativeCost {
                op: op.name.clone(),
                cost: op.cost,
            });
        }
        for &(var, val) in &op.prevail {
            chk_val(var, val, &|| format!("op.prevail: {}", op.name))?;
        }
        for pp in &op.pre_posts {
            for &(cv, cval) in &pp.conds {
                chk_val(cv, cval, &|| format!("op.cond: {}", op.name))?;
            }
            chk_var(pp.var, &|| format!("op.var: {}", op.name))?;
            if let Some(pre) = pp.pre {
                chk_val(pp.var, pre, &|| format!("op.pre: {}", op.name))?;
            }
            chk_val(pp.var, pp.post, &|| format!("op.post: {}", op.name))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Operator, PrePost, Variable};
    use smallvec::smallvec;

    fn valid_task() -> Task {
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
                    domain_size: 3,
                },
            ],
            init: vec![0, 2],
            goal: vec![(0, 1)],
            ops: vec![Operator {
                name: "set-a".into(),
                prevail: vec![(1, 2)],
                pre_posts: smallvec![PrePost {
                    conds: smallvec![],
                    var: 0,
                    pre: Some(0),
                    post: 1,
                }],
                cost: 1.0,
            }],
            mutexes: vec![],
        }
    }

    #[test]
    fn test_valid_task_passes() {
        assert!(validate_task(&valid_task()).is_ok());
    }

    #[test]
    fn test_init_size_mismatch() {
        let mut t = valid_task();
        t.init.pop();
        assert!(matches!(
            validate_task(&t),
            Err(TaskError::InitSizeMismatch { init: 1, vars: 2 })
        ));
    }

    #[test]
    fn test_goal_value_out_of_domain() {
        let mut t = valid_task();
        t.goal.push((1, 3));
        let err = validate_task(&t).unwrap_err();
        assert!(matches!(
            err,
            TaskError::ValueOutOfRange {
                var: 1,
                val: 3,
                domain: 3,
                ..
            }
        ));
        assert_eq!(err.exit_code(), 9);
    }

    #[test]
    fn test_operator_location_in_message() {
        let mut t = valid_task();
        t.ops[0].prevail[0] = (7, 0);
        let msg = validate_task(&t).unwrap_err().to_string();
        assert!(msg.contains("op.prevail: set-a"), "got: {msg}");
    }

    #[test]
    fn test_negative_cost() {
        let mut t = valid_task();
        t.ops[0].cost = -1.0;
        assert!(matches!(
            validate_task(&t),
            Err(TaskError::NegativeCost { .. })
        ));
    }
}
