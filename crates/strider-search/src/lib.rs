//! Sequential best-first search engines over grounded SAS+ tasks.
//!
//! The engines share a node arena, a hash index from states to arena ids,
//! and an in-place work state with an undo log; they differ in open-list
//! discipline. [`astar::astar`] is cost-optimal under an admissible
//! consistent heuristic, [`gbfs::gbfs`] is satisficing, and
//! [`bidir::bidir_astar`] combines forward A* with backward regression
//! over partial states.
//!
//! When every operator cost and the heuristic are integral, the open lists
//! are bucket queues over packed `(f, h)` keys ([`bucket`]); otherwise the
//! engines fall back to lazy-deletion binary heaps over reals.

pub mod apply;
pub mod astar;
pub mod bidir;
pub mod bucket;
pub mod context;
pub mod gbfs;
mod node;
pub mod result;
pub mod strips;

pub use apply::{apply_inplace, is_applicable, MutexMode, UndoGuard, UndoLog};
pub use astar::astar;
pub use bidir::{bidir_astar, goal_partial, regress, satisfies, PartialState};
pub use bucket::{
    pack_fh_asc, pack_fh_desc, unpack_f, unpack_h, BucketPq, TwoLevelBucketPq, H_BITS, H_INF,
    KEY_MASK,
};
pub use context::SearchContext;
pub use gbfs::gbfs;
pub use result::{Params, SearchError, SearchResult, SearchStatus, Stats};
pub use strips::astar_strips;
