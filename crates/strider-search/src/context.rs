//! Per-search execution context: resource budgets and mutex policy.
//!
//! The context is passed by reference into every engine instead of living
//! in globals; the engines sample it at the top of their main loops and
//! surface a dedicated result status when a budget trips.

use crate::apply::MutexMode;
use std::time::{Duration, Instant};

/// Budgets and policies for one search run.
pub struct SearchContext {
    pub mutex_mode: MutexMode,
    cpu_limit: Option<Duration>,
    mem_limit_mb: Option<usize>,
    /// Process CPU time consumed when the context was created.
    cpu_start: Option<Duration>,
    /// Wall-clock fallback where process CPU time is unavailable.
    wall_start: Instant,
}

impl Default for SearchContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchContext {
    pub fn new() -> Self {
        Self {
            mutex_mode: MutexMode::default(),
            cpu_limit: None,
            mem_limit_mb: None,
            cpu_start: process_cpu_time(),
            wall_start: Instant::now(),
        }
    }

    pub fn with_mutex_mode(mut self, mode: MutexMode) -> Self {
        self.mutex_mode = mode;
        self
    }

    /// Cap the search at `secs` seconds of process CPU time.
    pub fn with_cpu_limit_secs(mut self, secs: f64) -> Self {
        self.cpu_limit = (secs > 0.0).then(|| Duration::from_secs_f64(secs));
        self
    }

    /// Cap the search at `mb` megabytes of resident memory.
    pub fn with_mem_limit_mb(mut self, mb: usize) -> Self {
        self.mem_limit_mb = (mb > 0).then_some(mb);
        self
    }

    /// Has the CPU budget been crossed? Cheap enough for every iteration.
    pub fn cpu_exceeded(&self) -> bool {
        let Some(limit) = self.cpu_limit else {
            return false;
        };
        match (process_cpu_time(), self.cpu_start) {
            (Some(now), Some(start)) => now.saturating_sub(start) >= limit,
            _ => self.wall_start.elapsed() >= limit,
        }
    }

    /// Has the resident-memory budget been crossed? Costs a stat read, so
    /// callers sample it every few thousand expansions.
    pub fn mem_exceeded(&self) -> bool {
        let Some(limit_mb) = self.mem_limit_mb else {
            return false;
        };
        current_memory_mb().is_some_and(|mb| mb >= limit_mb)
    }
}

/// Current process resident memory in MB, or None if unavailable.
fn current_memory_mb() -> Option<usize> {
    memory_stats::memory_stats().map(|stats| stats.physical_mem / (1024 * 1024))
}

/// Total process CPU time (user + system).
#[cfg(unix)]
fn process_cpu_time() -> Option<Duration> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::uninit();
    // SAFETY: getrusage fully initializes the struct when it returns 0.
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    let usage = unsafe { usage.assume_init() };
    let to_duration =
        |tv: libc::timeval| Duration::new(tv.tv_sec as u64, (tv.tv_usec as u32).saturating_mul(1000));
    Some(to_duration(usage.ru_utime) + to_duration(usage.ru_stime))
}

#[cfg(not(unix))]
fn process_cpu_time() -> Option<Duration> {
    None
}
