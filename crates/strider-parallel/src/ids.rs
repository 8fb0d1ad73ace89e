//! Monotonic node-id allocation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free allocator of globally unique, totally ordered node ids.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    pub fn reset(&self, start: u64) {
        self.next.store(start, Ordering::Relaxed);
    }
}
