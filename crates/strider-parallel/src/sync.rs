//! Concurrency primitives for the parallel search core.
//!
//! All locks hand out RAII guards, so unlock happens on every exit path.
//! The spin lock suits short critical sections (a heap push/pop on a small
//! shard); the ticket lock adds FIFO fairness for shards with higher
//! contention.

use std::cell::{Cell, UnsafeCell};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Exponential busy-wait: spin with the CPU pause hint for small counts,
/// hand the core to the OS scheduler once the wait drags on. The delay
/// doubles up to a cap.
pub struct Backoff {
    spins: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self { spins: 1 }
    }

    pub fn reset(&mut self) {
        self.spins = 1;
    }

    /// Busy-wait without yielding.
    pub fn pause(&mut self) {
        for _ in 0..self.spins {
            std::hint::spin_loop();
        }
        if self.spins < 1 << 12 {
            self.spins <<= 1;
        }
    }

    /// Yield to the OS scheduler.
    pub fn yield_now(&mut self) {
        std::thread::yield_now();
        if self.spins < 1 << 10 {
            self.spins <<= 1;
        }
    }

    /// Spin while the wait is short, yield once it is not.
    pub fn snooze(&mut self) {
        if self.spins < 1 << 8 {
            self.pause();
        } else {
            self.yield_now();
        }
    }
}

/// 64-byte-aligned wrapper that keeps hot atomics on their own cache line.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

impl<T> CacheAligned<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for CacheAligned<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

/// Test-and-test-and-set spin lock with exponential pause backoff.
pub struct SpinLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: the lock grants exclusive access to the data, so sharing the
// lock across threads is sound whenever the data itself can move threads.
unsafe impl<T: Send> Sync for SpinLock<T> {}
unsafe impl<T: Send> Send for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }

    pub fn lock(&self) -> SpinGuard<'_, T> {
        let mut backoff = Backoff::new();
        loop {
            if !self.locked.swap(true, Ordering::Acquire) {
                return SpinGuard { lock: self };
            }
            // Spin on a plain load until the lock looks free.
            while self.locked.load(Ordering::Relaxed) {
                backoff.pause();
            }
        }
    }
}

pub struct SpinGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: the guard holds the lock.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the lock exclusively.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

/// FIFO ticket lock: two cache-aligned counters, threads are served in
/// ticket order.
pub struct TicketLock<T> {
    next: CacheAligned<AtomicU32>,
    serving: CacheAligned<AtomicU32>,
    data: UnsafeCell<T>,
}

// SAFETY: as for SpinLock.
unsafe impl<T: Send> Sync for TicketLock<T> {}
unsafe impl<T: Send> Send for TicketLock<T> {}

impl<T> TicketLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            next: CacheAligned::new(AtomicU32::new(0)),
            serving: CacheAligned::new(AtomicU32::new(0)),
            data: UnsafeCell::new(value),
        }
    }

    pub fn lock(&self) -> TicketGuard<'_, T> {
        let ticket = self.next.fetch_add(1, Ordering::AcqRel);
        let mut backoff = Backoff::new();
        while self.serving.load(Ordering::Acquire) != ticket {
            backoff.pause();
        }
        TicketGuard { lock: self }
    }
}

pub struct TicketGuard<'a, T> {
    lock: &'a TicketLock<T>,
}

impl<T> Deref for TicketGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: the guard holds the lock.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for TicketGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the lock exclusively.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for TicketGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.serving.fetch_add(1, Ordering::Release);
    }
}

/// Two-phase counter barrier for warm-up synchronization.
pub struct SimpleBarrier {
    n: u32,
    count: AtomicU32,
    phase: AtomicU32,
}

impl SimpleBarrier {
    pub fn new(n: u32) -> Self {
        Self {
            n,
            count: AtomicU32::new(0),
            phase: AtomicU32::new(0),
        }
    }

    pub fn arrive_and_wait(&self) {
        let phase = self.phase.load(Ordering::Relaxed);
        if self.count.fetch_add(1, Ordering::AcqRel) + 1 == self.n {
            self.count.store(0, Ordering::Release);
            self.phase.fetch_add(1, Ordering::AcqRel);
        } else {
            let mut backoff = Backoff::new();
            while self.phase.load(Ordering::Acquire) == phase {
                backoff.pause();
            }
        }
    }
}

thread_local! {
    /// This worker's 0-based index; dispatches to per-thread stats without
    /// a lookup.
    static THREAD_INDEX: Cell<u32> = const { Cell::new(u32::MAX) };
}

pub fn set_current_thread_index(index: u32) {
    THREAD_INDEX.with(|cell| cell.set(index));
}

/// `u32::MAX` when the thread never registered.
pub fn current_thread_index() -> u32 {
    THREAD_INDEX.with(|cell| cell.get())
}
