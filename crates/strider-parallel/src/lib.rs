//! Parallel shared-open-list A* for grounded SAS+ tasks.
//!
//! N worker threads share an open list (sharded, with k-choice sampling),
//! a lock-striped closed table whose `prune_or_update` is the single
//! linearization point for duplicate decisions, a lock-striped state
//! store, and an atomic id allocator. Statistics are thread-local during
//! the run and reduced after the workers join. Termination combines a
//! stop flag (goal posted, timeout) with an idle-workers-and-empty-open
//! predicate sampled under exponential backoff.

pub mod closed;
pub mod ids;
pub mod open;
pub mod search;
pub mod stats;
pub mod store;
pub mod sync;
pub mod termination;

pub use closed::{state_fingerprint, ClosedEntry, ClosedTable, PruneDecision};
pub use ids::IdAllocator;
pub use open::{MultiQueueOpen, OpenKind, OpenNode, Popped, SharedOpen, TwoLevelBucketOpen};
pub use search::{astar_parallel, ParallelParams, ParallelResult};
pub use stats::{measure_ns, GlobalStats, ThreadStats};
pub use store::{StateMut, StateRef, StateStore};
pub use sync::{
    current_thread_index, set_current_thread_index, Backoff, CacheAligned, SimpleBarrier,
    SpinLock, TicketLock,
};
pub use termination::{ActiveWorkers, Termination};
