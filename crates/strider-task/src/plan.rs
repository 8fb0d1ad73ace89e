//! Plan cost evaluation and output formatting.

use crate::task::Task;
use std::fmt::Write;

/// Sum of operator costs along a plan (indices into `task.ops`).
pub fn plan_cost(task: &Task, plan: &[u32]) -> f64 {
    plan.iter().map(|&op| task.ops[op as usize].cost).sum()
}

/// Numbered human-readable listing, one operator per line.
pub fn plan_to_string(task: &Task, plan: &[u32]) -> String {
    let mut out = String::new();
    for (i, &op) in plan.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let op = &task.ops[op as usize];
        let _ = write!(out, "{}: {} [cost={}]", i, op.name, format_cost(op.cost));
    }
    out
}

/// VAL-style plan text: one `(name)` line per operator, followed by the
/// `; cost` and `; length` trailer lines.
pub fn plan_to_val(task: &Task, plan: &[u32]) -> String {
    let mut out = String::new();
    for &op in plan {
        let _ = writeln!(out, "({})", task.ops[op as usize].name);
    }
    let _ = writeln!(out, "; cost = {}", format_cost(plan_cost(task, plan)));
    let _ = writeln!(out, "; length = {}", plan.len());
    out
}

/// Integral costs print without a decimal point.
fn format_cost(cost: f64) -> String {
    if cost.fract() == 0.0 && cost.abs() < 1e15 {
        format!("{}", cost as i64)
    } else {
        format!("{cost}")
    }
}
