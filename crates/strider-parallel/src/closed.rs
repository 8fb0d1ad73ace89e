//! Lock-striped closed table.
//!
//! The table is split into a power-of-two number of stripes chosen from
//! the thread count at construction; the stripe array is never resized
//! (that would mean relocking every stripe), while each per-stripe map
//! grows freely. [`ClosedTable::prune_or_update`] is the sole
//! linearization point for duplicate decisions in the parallel search.

use ahash::RandomState;
use std::collections::HashMap;
use std::sync::RwLock;
use strider_task::State;

/// 64-bit fingerprint of a state, used for stripe selection.
pub fn state_fingerprint(s: &[u16]) -> u64 {
    // FNV-1a-style fold with a golden-ratio offset per value.
    let mut hash: u64 = 0xcbf29ce484222325;
    for &v in s {
        hash ^= (v as u64).wrapping_add(0x9e3779b97f4a7c15);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Best known reach of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedEntry {
    pub best_g: u32,
    pub node_id: u64,
}

/// What [`ClosedTable::prune_or_update`] decided, atomically per stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneDecision {
    /// An existing entry is at least as good (or reopening is off):
    /// drop the successor.
    Pruned,
    /// First visit; the entry was created.
    Inserted,
    /// The state was known and this path improves it; the entry was
    /// updated in place.
    Reopened,
}

type StripeMap = HashMap<State, ClosedEntry, RandomState>;

pub struct ClosedTable {
    stripes: Vec<RwLock<StripeMap>>,
    mask: usize,
}

impl ClosedTable {
    /// `stripe_count` is rounded up to a power of two.
    pub fn new(stripe_count: u32) -> Self {
        let n = stripe_count.max(1).next_power_of_two() as usize;
        Self {
            stripes: (0..n).map(|_| RwLock::new(StripeMap::default())).collect(),
            mask: n - 1,
        }
    }

    /// Stripe count sized for `threads` workers.
    pub fn for_threads(threads: u32) -> Self {
        Self::new(1024.max(threads * 64))
    }

    pub fn num_stripes(&self) -> usize {
        self.stripes.len()
    }

    #[inline]
    fn stripe_of(&self, s: &[u16]) -> usize {
        state_fingerprint(s) as usize & self.mask
    }

    /// Decide the fate of a successor reaching state `s` with cost `g`.
    ///
    /// Under one stripe write lock: unknown states are recorded
    /// ([`PruneDecision::Inserted`]); known states with `best_g <= g` are
    /// pruned; improvements update the entry in place and report
    /// [`PruneDecision::Reopened`], unless `allow_reopen` is off, in which
    /// case any known state prunes.
    pub fn prune_or_update(
        &self,
        s: &[u16],
        g: u32,
        node_id: u64,
        allow_reopen: bool,
    ) -> PruneDecision {
        let stripe = &self.stripes[self.stripe_of(s)];
        let mut map = stripe.write().expect("closed stripe poisoned");
        match map.get_mut(s) {
            None => {
                map.insert(s.to_vec(), ClosedEntry { best_g: g, node_id });
                PruneDecision::Inserted
            }
            Some(entry) => {
                if g >= entry.best_g || !allow_reopen {
                    PruneDecision::Pruned
                } else {
                    entry.best_g = g;
                    entry.node_id = node_id;
                    PruneDecision::Reopened
                }
            }
        }
    }

    pub fn get(&self, s: &[u16]) -> Option<ClosedEntry> {
        let stripe = &self.stripes[self.stripe_of(s)];
        let map = stripe.read().expect("closed stripe poisoned");
        map.get(s).copied()
    }

    pub fn len(&self) -> usize {
        self.stripes
            .iter()
            .map(|s| s.read().expect("closed stripe poisoned").len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
