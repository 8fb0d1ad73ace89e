//! Per-thread search statistics.
//!
//! Each worker owns one cache-line-aligned block and is the only writer to
//! it during the search; the reduction into a single block happens after
//! all workers have joined, so no counter update ever crosses threads.

use std::time::Instant;

/// Counters owned by one worker.
#[repr(align(64))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadStats {
    pub expanded: u64,
    pub generated: u64,
    pub evaluated: u64,
    pub reopened: u64,
    pub duplicates_pruned: u64,

    // Open-list traffic.
    pub pushes: u64,
    pub pops: u64,
    /// Pops served by a shard other than the first choice.
    pub steals: u64,
    /// Sampled shards that turned out empty (approximate load signal).
    pub bucket_pop_empty_probes: u64,

    /// Nanoseconds spent in heuristic evaluation.
    pub h_eval_ns: u64,
    /// Largest global open size observed by this worker (approximate).
    pub max_open_size_seen: u64,
}

impl ThreadStats {
    pub fn reset(&mut self) {
        *self = ThreadStats::default();
    }

    /// Fold another block into this one. Maxima take the max, everything
    /// else sums.
    pub fn add(&mut self, other: &ThreadStats) {
        self.expanded += other.expanded;
        self.generated += other.generated;
        self.evaluated += other.evaluated;
        self.reopened += other.reopened;
        self.duplicates_pruned += other.duplicates_pruned;
        self.pushes += other.pushes;
        self.pops += other.pops;
        self.steals += other.steals;
        self.bucket_pop_empty_probes += other.bucket_pop_empty_probes;
        self.h_eval_ns += other.h_eval_ns;
        self.max_open_size_seen = self.max_open_size_seen.max(other.max_open_size_seen);
    }
}

/// One stats block per worker; reduced only at finalization.
#[derive(Debug, Default)]
pub struct GlobalStats {
    pub per_thread: Vec<ThreadStats>,
}

impl GlobalStats {
    pub fn new(num_threads: u32) -> Self {
        Self {
            per_thread: vec![ThreadStats::default(); num_threads as usize],
        }
    }

    pub fn sum(&self) -> ThreadStats {
        let mut total = ThreadStats::default();
        for t in &self.per_thread {
            total.add(t);
        }
        total
    }
}

/// Run `f`, returning its result and the elapsed wall time in nanoseconds.
pub fn measure_ns<R>(f: impl FnOnce() -> R) -> (R, u64) {
    let t0 = Instant::now();
    let out = f();
    (out, t0.elapsed().as_nanos() as u64)
}
