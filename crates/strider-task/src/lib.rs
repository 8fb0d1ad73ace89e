//! Grounded SAS+ planning tasks.
//!
//! A task is a set of finite-domain variables, an initial assignment, a
//! partial goal assignment, and a list of operators with prevail conditions
//! and (possibly conditional) variable effects. This crate owns the task
//! model, the line-oriented SAS+ text format, fail-fast input validation,
//! and plan cost/formatting helpers. The search engines consume the task
//! read-only.

pub mod plan;
pub mod sas;
pub mod strips;
pub mod task;
pub mod validate;

pub use plan::{plan_cost, plan_to_string, plan_to_val};
pub use sas::{parse_sas, ParseError};
pub use strips::{
    apply_inplace_strips, undo_strips_to, StripsAction, StripsState, StripsTask, StripsUndo,
};
pub use task::{MutexGroup, Operator, PrePost, State, Task, VarVal, Variable};
pub use validate::{validate_task, TaskError};
