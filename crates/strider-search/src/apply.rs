//! Operator application over a single mutable work state.
//!
//! The expansion loops reuse one state buffer: each successor is produced
//! by mutating the work state in place, visited through an [`UndoGuard`],
//! and rolled back when the guard drops. Every variable write is logged as
//! `(var, old_value)` so rollback is exact regardless of how many
//! `pre_posts` touched the same variable.

use smallvec::SmallVec;
use strider_task::{Operator, Task};

/// Mutex filtering policy for generated successors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutexMode {
    /// Filter iff the task declares mutex groups.
    #[default]
    Auto,
    On,
    Off,
}

impl MutexMode {
    /// Resolve the policy against a concrete task.
    pub fn enabled_for(self, task: &Task) -> bool {
        match self {
            MutexMode::Auto => !task.mutexes.is_empty(),
            MutexMode::On => true,
            MutexMode::Off => false,
        }
    }
}

/// Is `op` applicable in `s`? Prevails, effect conditions, and `pre`
/// clauses must all hold.
pub fn is_applicable(op: &Operator, s: &[u16]) -> bool {
    for &(v, val) in &op.prevail {
        if s[v] != val {
            return false;
        }
    }
    for pp in &op.pre_posts {
        for &(cv, cval) in &pp.conds {
            if s[cv] != cval {
                return false;
            }
        }
    }
    for pp in &op.pre_posts {
        if let Some(pre) = pp.pre {
            if s[pp.var] != pre {
                return false;
            }
        }
    }
    true
}

/// Undo log of `(var, old_value)` writes, shared across an expansion loop.
#[derive(Default)]
pub struct UndoLog {
    entries: SmallVec<[(usize, u16); 16]>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current log length; pass to [`Self::undo_to`] to roll back to here.
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    /// Rewind `state` to the snapshot taken at `mark` and truncate the log.
    pub fn undo_to(&mut self, state: &mut [u16], mark: usize) {
        for &(var, old) in self.entries[mark..].iter().rev() {
            state[var] = old;
        }
        self.entries.truncate(mark);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn record(&mut self, var: usize, old: u16) {
        self.entries.push((var, old));
    }
}

/// Write `op`'s effects into `s`, logging every change. With several
/// `pre_posts` on one variable the last write wins, as in the SAS+ format.
pub fn apply_inplace(op: &Operator, s: &mut [u16], undo: &mut UndoLog) {
    for pp in &op.pre_posts {
        if s[pp.var] != pp.post {
            undo.record(pp.var, s[pp.var]);
            s[pp.var] = pp.post;
        }
    }
}

/// Scoped successor view: applies `op` on construction, restores the work
/// state when dropped, on every exit path out of the visit block.
pub struct UndoGuard<'a> {
    state: &'a mut [u16],
    undo: &'a mut UndoLog,
    mark: usize,
}

impl<'a> UndoGuard<'a> {
    pub fn apply(op: &Operator, state: &'a mut [u16], undo: &'a mut UndoLog) -> Self {
        let mark = undo.mark();
        apply_inplace(op, state, undo);
        Self { state, undo, mark }
    }
}

impl std::ops::Deref for UndoGuard<'_> {
    type Target = [u16];

    fn deref(&self) -> &[u16] {
        self.state
    }
}

impl Drop for UndoGuard<'_> {
    fn drop(&mut self) {
        self.undo.undo_to(self.state, self.mark);
    }
}
