//! SAS+ task model: variables, operators, mutex groups.

use smallvec::SmallVec;

/// A concrete state: one domain value per variable, indexed by variable id.
pub type State = Vec<u16>;

/// A `(variable, value)` pair, the atom of goals, prevails, and conditions.
pub type VarVal = (usize, u16);

/// A finite-domain state variable.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    /// Number of values in the domain; legal values are `0..domain_size`.
    pub domain_size: u16,
}

/// One effect of an operator: under `conds`, variable `var` transitions
/// from `pre` (or from anything, when `pre` is `None`) to `post`.
#[derive(Debug, Clone)]
pub struct PrePost {
    /// Extra condition conjuncts that must hold in the predecessor state.
    pub conds: SmallVec<[VarVal; 2]>,
    pub var: usize,
    /// Required prior value; `None` encodes the SAS+ "don't care" (-1).
    pub pre: Option<u16>,
    pub post: u16,
}

/// A grounded operator in the Fast Downward SAS+ shape.
///
/// `prevail` entries must hold before the operator and are not written.
/// When several `pre_posts` write the same variable the last one wins.
#[derive(Debug, Clone)]
pub struct Operator {
    pub name: String,
    pub prevail: Vec<VarVal>,
    pub pre_posts: SmallVec<[PrePost; 2]>,
    pub cost: f64,
}

/// A set of literals of which at most one may hold in any reachable state.
#[derive(Debug, Clone)]
pub struct MutexGroup {
    pub lits: Vec<VarVal>,
}

/// A complete grounded planning task. Immutable during search.
#[derive(Debug, Clone)]
pub struct Task {
    pub version: i32,
    /// 0 = unit costs requested, 1 = action costs in effect.
    pub metric: i32,
    pub vars: Vec<Variable>,
    pub init: State,
    /// Partial goal assignment.
    pub goal: Vec<VarVal>,
    pub ops: Vec<Operator>,
    pub mutexes: Vec<MutexGroup>,
}

/// Tolerance below which an action cost counts as integral.
pub const COST_EPS: f64 = 1e-12;

impl Task {
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Does `s` satisfy every goal literal?
    pub fn is_goal(&self, s: &[u16]) -> bool {
        self.goal.iter().all(|&(v, val)| s[v] == val)
    }

    /// Does `s` make two or more literals of any mutex group true?
    pub fn violates_mutex(&self, s: &[u16]) -> bool {
        for group in &self.mutexes {
            let mut hits = 0;
            for &(v, val) in &group.lits {
                if v < s.len() && s[v] == val {
                    hits += 1;
                    if hits > 1 {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// True when every operator cost is within [`COST_EPS`] of an integer.
    /// Enables the integer engines' packed-key fast path.
    pub fn all_costs_integral(&self) -> bool {
        self.ops.iter().all(|op| {
            op.cost.is_finite() && (op.cost - op.cost.round()).abs() <= COST_EPS
        })
    }
}
