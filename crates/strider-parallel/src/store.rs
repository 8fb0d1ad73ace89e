//! Lock-striped id-to-state store.
//!
//! Node ids are dense and monotone, so striping by the low id bits spreads
//! writers evenly. Besides copying reads, the store offers guard-carrying
//! references whose lifetime holds the stripe lock, for callers that only
//! need to look at a state briefly.

use ahash::RandomState;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use strider_task::State;

type StripeMap = HashMap<u64, State, RandomState>;

pub struct StateStore {
    stripes: Vec<RwLock<StripeMap>>,
    mask: u64,
}

impl StateStore {
    /// `stripe_count` is rounded up to a power of two.
    pub fn new(stripe_count: u32) -> Self {
        let n = stripe_count.max(1).next_power_of_two() as usize;
        Self {
            stripes: (0..n).map(|_| RwLock::new(StripeMap::default())).collect(),
            mask: (n - 1) as u64,
        }
    }

    /// Stripe count sized for `threads` workers.
    pub fn for_threads(threads: u32) -> Self {
        Self::new(2048.max(threads * 128))
    }

    #[inline]
    fn stripe_of(&self, id: u64) -> usize {
        (id & self.mask) as usize
    }

    pub fn put(&self, id: u64, state: State) {
        let stripe = &self.stripes[self.stripe_of(id)];
        stripe
            .write()
            .expect("state stripe poisoned")
            .insert(id, state);
    }

    /// Copy the state for `id` into `out`. Returns false when unknown.
    pub fn copy_into(&self, id: u64, out: &mut State) -> bool {
        let stripe = &self.stripes[self.stripe_of(id)];
        let map = stripe.read().expect("state stripe poisoned");
        match map.get(&id) {
            Some(s) => {
                out.clone_from(s);
                true
            }
            None => false,
        }
    }

    pub fn get_cloned(&self, id: u64) -> Option<State> {
        let stripe = &self.stripes[self.stripe_of(id)];
        let map = stripe.read().expect("state stripe poisoned");
        map.get(&id).cloned()
    }

    /// Read reference holding the stripe's read lock for its lifetime.
    pub fn read(&self, id: u64) -> Option<StateRef<'_>> {
        let guard = self.stripes[self.stripe_of(id)]
            .read()
            .expect("state stripe poisoned");
        let ptr: *const State = guard.get(&id)?;
        Some(StateRef { _guard: guard, ptr })
    }

    /// Write reference holding the stripe's write lock for its lifetime.
    pub fn write(&self, id: u64) -> Option<StateMut<'_>> {
        let mut guard = self.stripes[self.stripe_of(id)]
            .write()
            .expect("state stripe poisoned");
        let ptr: *mut State = guard.get_mut(&id)?;
        Some(StateMut { _guard: guard, ptr })
    }
}

/// Shared view of one stored state; the stripe stays read-locked while
/// this is alive.
pub struct StateRef<'a> {
    _guard: RwLockReadGuard<'a, StripeMap>,
    ptr: *const State,
}

impl Deref for StateRef<'_> {
    type Target = State;
    fn deref(&self) -> &State {
        // SAFETY: the map entry cannot move or be removed while the
        // stripe's read guard is held.
        unsafe { &*self.ptr }
    }
}

/// Exclusive view of one stored state; the stripe stays write-locked while
/// this is alive.
pub struct StateMut<'a> {
    _guard: RwLockWriteGuard<'a, StripeMap>,
    ptr: *mut State,
}

impl Deref for StateMut<'_> {
    type Target = State;
    fn deref(&self) -> &State {
        // SAFETY: as for StateRef, with exclusive access.
        unsafe { &*self.ptr }
    }
}

impl DerefMut for StateMut<'_> {
    fn deref_mut(&mut self) -> &mut State {
        // SAFETY: as for StateRef, with exclusive access.
        unsafe { &mut *self.ptr }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_put_and_read() {
        let store = StateStore::new(4);
        store.put(7, vec![1, 2, 3]);
        assert_eq!(store.get_cloned(7), Some(vec![1, 2, 3]));
        assert_eq!(store.get_cloned(8), None);

        let r = store.read(7).unwrap();
        assert_eq!(&*r, &vec![1, 2, 3]);
        assert!(store.read(99).is_none());
    }

    #[test]
    fn test_copy_into() {
        let store = StateStore::new(4);
        store.put(1, vec![4, 5]);
        let mut buf = Vec::new();
        assert!(store.copy_into(1, &mut buf));
        assert_eq!(buf, vec![4, 5]);
        assert!(!store.copy_into(2, &mut buf));
    }

    #[test]
    fn test_write_ref_mutates() {
        let store = StateStore::new(4);
        store.put(3, vec![0, 0]);
        {
            let mut w = store.write(3).unwrap();
            w[1] = 9;
        }
        assert_eq!(store.get_cloned(3), Some(vec![0, 9]));
    }

    #[test]
    fn test_concurrent_puts() {
        let store = Arc::new(StateStore::for_threads(4));
        let mut handles = vec![];
        for t in 0..4u64 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for i in 0..500u64 {
                    let id = t * 1000 + i;
                    store.put(id, vec![t as u16, i as u16]);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get_cloned(3_499), Some(vec![3, 499]));
        assert_eq!(store.get_cloned(0), Some(vec![0, 0]));
    }
}
