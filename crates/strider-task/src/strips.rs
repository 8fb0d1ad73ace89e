//! Propositional STRIPS task variant.
//!
//! Facts are plain indices; a state is a packed truth vector of 64-bit
//! words. Actions carry positive/negative precondition fact lists and
//! add/delete effect lists. This is the representation the STRIPS search
//! engine and its bitmask heuristics work over.

use std::fmt;

/// A STRIPS action over fact ids.
#[derive(Debug, Clone)]
pub struct StripsAction {
    pub name: String,
    /// Facts that must be true.
    pub pre_pos: Vec<usize>,
    /// Facts that must be false.
    pub pre_neg: Vec<usize>,
    pub add: Vec<usize>,
    pub del: Vec<usize>,
    pub cost: f64,
}

impl StripsAction {
    /// Positive and negative preconditions against a packed state.
    pub fn applicable_in(&self, s: &StripsState) -> bool {
        self.pre_pos.iter().all(|&f| s.test(f)) && self.pre_neg.iter().all(|&f| !s.test(f))
    }
}

/// Truth vector over facts, 64 facts per word.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StripsState {
    pub bits: Vec<u64>,
}

impl StripsState {
    pub fn with_facts(num_facts: usize) -> Self {
        Self {
            bits: vec![0; num_facts.div_ceil(64)],
        }
    }

    #[inline]
    pub fn test(&self, fact: usize) -> bool {
        (self.bits[fact >> 6] >> (fact & 63)) & 1 != 0
    }

    #[inline]
    pub fn set(&mut self, fact: usize) {
        self.bits[fact >> 6] |= 1 << (fact & 63);
    }

    #[inline]
    pub fn reset(&mut self, fact: usize) {
        self.bits[fact >> 6] &= !(1 << (fact & 63));
    }

    #[inline]
    pub fn flip(&mut self, fact: usize) {
        self.bits[fact >> 6] ^= 1 << (fact & 63);
    }

    pub fn count_true(&self) -> u32 {
        self.bits.iter().map(|w| w.count_ones()).sum()
    }
}

impl fmt::Display for StripsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for (w, &word) in self.bits.iter().enumerate() {
            let mut word = word;
            while word != 0 {
                let bit = word.trailing_zeros() as usize;
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{}", (w << 6) + bit)?;
                first = false;
                word &= word - 1;
            }
        }
        write!(f, "}}")
    }
}

/// A grounded propositional task.
#[derive(Debug, Clone, Default)]
pub struct StripsTask {
    pub fact_names: Vec<String>,
    pub actions: Vec<StripsAction>,
    /// Fact ids true initially.
    pub init_true: Vec<usize>,
    /// Fact ids required true at the goal.
    pub goal_pos: Vec<usize>,
    /// Fact ids required false at the goal.
    pub goal_neg: Vec<usize>,
}

impl StripsTask {
    pub fn num_facts(&self) -> usize {
        self.fact_names.len()
    }

    pub fn make_init_state(&self) -> StripsState {
        let mut s = StripsState::with_facts(self.num_facts());
        for &f in &self.init_true {
            s.set(f);
        }
        s
    }

    pub fn is_goal(&self, s: &StripsState) -> bool {
        self.goal_pos.iter().all(|&f| s.test(f)) && self.goal_neg.iter().all(|&f| !s.test(f))
    }

    pub fn all_costs_integral(&self) -> bool {
        self.actions
            .iter()
            .all(|a| a.cost.is_finite() && (a.cost - a.cost.round()).abs() <= crate::task::COST_EPS)
    }

    /// Apply `action` to `s`, writing the successor into `out` (deletes
    /// before adds).
    pub fn apply_into(&self, s: &StripsState, action: &StripsAction, out: &mut StripsState) {
        out.clone_from(s);
        for &f in &action.del {
            out.reset(f);
        }
        for &f in &action.add {
            out.set(f);
        }
    }

    pub fn plan_cost(&self, plan: &[u32]) -> f64 {
        plan.iter().map(|&a| self.actions[a as usize].cost).sum()
    }
}

/// Log of flipped fact ids for in-place application.
#[derive(Debug, Default)]
pub struct StripsUndo {
    flipped: Vec<usize>,
}

impl StripsUndo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) -> usize {
        self.flipped.len()
    }

    pub fn clear(&mut self) {
        self.flipped.clear();
    }
}

/// Apply in place, recording every bit that actually changed.
pub fn apply_inplace_strips(action: &StripsAction, s: &mut StripsState, undo: &mut StripsUndo) {
    for &f in &action.del {
        if s.test(f) {
            s.reset(f);
            undo.flipped.push(f);
        }
    }
    for &f in &action.add {
        if !s.test(f) {
            s.set(f);
            undo.flipped.push(f);
        }
    }
}

/// Rewind flipped bits back to `mark`.
pub fn undo_strips_to(s: &mut StripsState, undo: &mut StripsUndo, mark: usize) {
    for &f in undo.flipped[mark..].iter().rev() {
        s.flip(f);
    }
    undo.flipped.truncate(mark);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_task() -> StripsTask {
        StripsTask {
            fact_names: (0..70).map(|i| format!("f{i}")).collect(),
            actions: vec![StripsAction {
                name: "a".into(),
                pre_pos: vec![0],
                pre_neg: vec![69],
                add: vec![69, 1],
                del: vec![0],
                cost: 2.0,
            }],
            init_true: vec![0],
            goal_pos: vec![69],
            goal_neg: vec![0],
        }
    }

    #[test]
    fn test_state_bits_across_words() {
        let mut s = StripsState::with_facts(70);
        assert_eq!(s.bits.len(), 2);
        s.set(69);
        s.set(1);
        assert!(s.test(69));
        assert!(s.test(1));
        assert!(!s.test(68));
        assert_eq!(s.count_true(), 2);
        s.reset(69);
        assert!(!s.test(69));
    }

    #[test]
    fn test_applicability() {
        let t = toy_task();
        let s = t.make_init_state();
        assert!(t.actions[0].applicable_in(&s));
        let mut s2 = s.clone();
        s2.set(69);
        assert!(!t.actions[0].applicable_in(&s2)); // pre_neg violated
        let mut s3 = s.clone();
        s3.reset(0);
        assert!(!t.actions[0].applicable_in(&s3)); // pre_pos violated
    }

    #[test]
    fn test_apply_into_reaches_goal() {
        let t = toy_task();
        let s = t.make_init_state();
        assert!(!t.is_goal(&s));
        let mut succ = StripsState::default();
        t.apply_into(&s, &t.actions[0], &mut succ);
        assert!(succ.test(69));
        assert!(succ.test(1));
        assert!(!succ.test(0));
        assert!(t.is_goal(&succ));
    }

    #[test]
    fn test_inplace_apply_and_undo() {
        let t = toy_task();
        let mut s = t.make_init_state();
        let original = s.clone();
        let mut undo = StripsUndo::new();
        let mark = undo.mark();
        apply_inplace_strips(&t.actions[0], &mut s, &mut undo);
        assert!(t.is_goal(&s));
        undo_strips_to(&mut s, &mut undo, mark);
        assert_eq!(s, original);
        assert_eq!(undo.mark(), 0);
    }

    #[test]
    fn test_delete_then_add_same_fact() {
        // A fact both deleted and added ends up true, and undo restores it.
        let action = StripsAction {
            name: "touch".into(),
            pre_pos: vec![],
            pre_neg: vec![],
            add: vec![3],
            del: vec![3],
            cost: 1.0,
        };
        let mut s = StripsState::with_facts(8);
        s.set(3);
        let mut undo = StripsUndo::new();
        apply_inplace_strips(&action, &mut s, &mut undo);
        assert!(s.test(3));
        undo_strips_to(&mut s, &mut undo, 0);
        assert!(s.test(3));
    }

    #[test]
    fn test_plan_cost() {
        let t = toy_task();
        assert_eq!(t.plan_cost(&[0, 0]), 4.0);
        assert!(t.all_costs_integral());
    }

    #[test]
    fn test_display_lists_true_facts() {
        let mut s = StripsState::with_facts(70);
        s.set(2);
        s.set(65);
        assert_eq!(s.to_string(), "{2, 65}");
    }
}
