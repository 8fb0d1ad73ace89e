//! Cooperative termination for the worker pool.
//!
//! Workers sample the controller at the top of their loop and exit when
//! `done` is set: by the first worker to observe a goal, by a timeout, or
//! by the idle-and-empty predicate. The active-worker counter is the other
//! half of that predicate: transient open-list emptiness while some worker
//! is still expanding must never look terminal.

use crate::sync::CacheAligned;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

const NO_GOAL: u64 = u64::MAX;

/// Shared stop flag, wall-clock limit, and the posted goal node.
pub struct Termination {
    start: Instant,
    time_limit: Option<Duration>,
    done: AtomicBool,
    goal: AtomicU64,
}

impl Termination {
    pub fn new(time_limit: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            time_limit,
            done: AtomicBool::new(false),
            goal: AtomicU64::new(NO_GOAL),
        }
    }

    pub fn timed_out(&self) -> bool {
        self.time_limit
            .is_some_and(|limit| self.start.elapsed() >= limit)
    }

    pub fn set_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Post a goal node and stop the pool. The first post wins; later
    /// posts report false and change nothing.
    pub fn post_goal(&self, node_id: u64) -> bool {
        let won = self
            .goal
            .compare_exchange(NO_GOAL, node_id, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        self.set_done();
        won
    }

    pub fn goal(&self) -> Option<u64> {
        match self.goal.load(Ordering::Acquire) {
            NO_GOAL => None,
            id => Some(id),
        }
    }
}

/// Count of workers currently holding work (not idle).
pub struct ActiveWorkers {
    count: CacheAligned<AtomicU32>,
}

impl ActiveWorkers {
    /// All `n` workers start counted as active.
    pub fn new(n: u32) -> Self {
        Self {
            count: CacheAligned::new(AtomicU32::new(n)),
        }
    }

    /// A worker obtained work again.
    pub fn enter(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// A worker went idle (popped nothing).
    pub fn exit(&self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_no_limit_never_times_out() {
        let t = Termination::new(None);
        assert!(!t.timed_out());
        assert!(!t.is_done());
    }

    #[test]
    fn test_zero_limit_times_out() {
        let t = Termination::new(Some(Duration::ZERO));
        assert!(t.timed_out());
    }

    #[test]
    fn test_first_goal_post_wins() {
        let t = Arc::new(Termination::new(None));
        let mut handles = vec![];
        for id in 0..8u64 {
            let t = Arc::clone(&t);
            handles.push(thread::spawn(move || t.post_goal(id)));
        }
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(wins, 1);
        assert!(t.is_done());
        assert!(t.goal().is_some());
    }

    #[test]
    fn test_active_workers_counter() {
        let a = ActiveWorkers::new(3);
        assert_eq!(a.count(), 3);
        a.exit();
        a.exit();
        assert_eq!(a.count(), 1);
        a.enter();
        assert_eq!(a.count(), 2);
    }
}
