//! Shared open lists: sharded priority queues behind one façade.
//!
//! Two variants with the same sharding/sampling discipline:
//!
//! * [`MultiQueueOpen`] — per-shard binary heap under a spin lock; pop
//!   tries the worker's home queue first, then sweeps the others.
//! * [`TwoLevelBucketOpen`] — per-shard two-level bucket queue plus a node
//!   slab, under a ticket lock. Push shards by a multiplicative hash of
//!   the node id; pop samples `k` shards uniformly at random (power of two
//!   choices) and takes the minimum of the first non-empty one, falling
//!   back to a linear sweep so progress is never lost to sampling.
//!
//! Priority order is exact per shard and approximate globally.

use crate::sync::{CacheAligned, SpinLock, TicketLock};
use rand::rngs::SmallRng;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use strider_search::{pack_fh_asc, TwoLevelBucketPq};

/// A search node as the parallel engine sees it: no state payload, just
/// costs and links (the state lives in the state store).
#[derive(Debug, Clone)]
pub struct OpenNode {
    pub id: u64,
    pub g: u32,
    pub h: u32,
    /// Operator that produced this node; `None` for the root.
    pub op: Option<u32>,
    /// Parent node id; `None` for the root.
    pub parent: Option<u64>,
}

impl OpenNode {
    #[inline]
    pub fn f(&self) -> u32 {
        self.g.saturating_add(self.h)
    }
}

/// A successful pop plus what it took to get it.
#[derive(Debug)]
pub struct Popped {
    pub node: OpenNode,
    /// Served by a shard other than the first one tried.
    pub stolen: bool,
    /// Shards probed that turned out empty.
    pub empty_probes: u32,
}

/// Heap ordering: pop smallest `f`, then smallest `h`, then largest id.
struct HeapEntry(OpenNode);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .f()
            .cmp(&self.0.f())
            .then_with(|| other.0.h.cmp(&self.0.h))
            .then_with(|| self.0.id.cmp(&other.0.id))
    }
}

/// Per-shard binary heaps under spin locks.
pub struct MultiQueueOpen {
    queues: Vec<CacheAligned<SpinLock<BinaryHeap<HeapEntry>>>>,
    len: AtomicU64,
}

impl MultiQueueOpen {
    pub fn new(num_queues: u32) -> Self {
        let n = num_queues.max(1) as usize;
        Self {
            queues: (0..n)
                .map(|_| CacheAligned::new(SpinLock::new(BinaryHeap::new())))
                .collect(),
            len: AtomicU64::new(0),
        }
    }

    pub fn push(&self, qid: u32, node: OpenNode) {
        let q = &self.queues[qid as usize % self.queues.len()];
        q.lock().push(HeapEntry(node));
        self.len.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Home queue first, then sweep the rest (work stealing).
    pub fn pop(&self, qid: u32) -> Option<Popped> {
        let n = self.queues.len();
        let mut empty_probes = 0u32;
        for t in 0..n {
            let idx = (qid as usize + t) % n;
            let mut q = self.queues[idx].lock();
            if let Some(HeapEntry(node)) = q.pop() {
                drop(q);
                self.len.fetch_sub(1, AtomicOrdering::Relaxed);
                return Some(Popped {
                    node,
                    stolen: t > 0,
                    empty_probes,
                });
            }
            empty_probes += 1;
        }
        None
    }

    pub fn len(&self) -> u64 {
        self.len.load(AtomicOrdering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One bucket shard: the queue keyed by slab slot, and the slab itself.
#[derive(Default)]
struct BucketShard {
    pq: TwoLevelBucketPq,
    slots: Vec<Option<OpenNode>>,
    free: Vec<u32>,
}

impl BucketShard {
    fn insert(&mut self, node: OpenNode) {
        let key = pack_fh_asc(node.f(), node.h);
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(node);
                slot
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Some(node));
                slot
            }
        };
        self.pq.insert(slot, key);
    }

    fn extract_min(&mut self) -> Option<OpenNode> {
        if self.pq.is_empty() {
            return None;
        }
        let (slot, _key) = self.pq.extract_min();
        let node = self.slots[slot as usize]
            .take()
            .expect("queue slot holds a node");
        self.free.push(slot);
        Some(node)
    }
}

/// Sharded two-level bucket open list with k-choice sampling.
pub struct TwoLevelBucketOpen {
    shards: Vec<CacheAligned<TicketLock<BucketShard>>>,
    len: AtomicU64,
    k_choice: u32,
}

impl TwoLevelBucketOpen {
    pub fn new(num_shards: u32, k_choice: u32) -> Self {
        let n = num_shards.max(1) as usize;
        Self {
            shards: (0..n)
                .map(|_| CacheAligned::new(TicketLock::new(BucketShard::default())))
                .collect(),
            len: AtomicU64::new(0),
            k_choice: k_choice.max(1),
        }
    }

    /// Multiplicative hash spreading consecutive ids across shards.
    #[inline]
    fn shard_of(&self, id: u64) -> usize {
        let mixed = id.wrapping_mul(0x9e3779b97f4a7c15);
        ((mixed >> 32) as usize) % self.shards.len()
    }

    pub fn push(&self, node: OpenNode) {
        let shard = &self.shards[self.shard_of(node.id)];
        shard.lock().insert(node);
        self.len.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Sample `k` shards at random; take the minimum of the first
    /// non-empty one. If all samples miss, sweep every shard in order so
    /// a non-empty list always yields.
    pub fn pop(&self, rng: &mut SmallRng) -> Option<Popped> {
        if self.len.load(AtomicOrdering::Relaxed) == 0 {
            return None;
        }
        let n = self.shards.len();
        let mut empty_probes = 0u32;

        for t in 0..self.k_choice {
            let sid = rng.gen_range(0..n);
            let mut shard = self.shards[sid].lock();
            if let Some(node) = shard.extract_min() {
                drop(shard);
                self.len.fetch_sub(1, AtomicOrdering::Relaxed);
                return Some(Popped {
                    node,
                    stolen: t > 0,
                    empty_probes,
                });
            }
            empty_probes += 1;
        }

        for sid in 0..n {
            let mut shard = self.shards[sid].lock();
            if let Some(node) = shard.extract_min() {
                drop(shard);
                self.len.fetch_sub(1, AtomicOrdering::Relaxed);
                return Some(Popped {
                    node,
                    stolen: true,
                    empty_probes,
                });
            }
            empty_probes += 1;
        }
        None
    }

    pub fn len(&self) -> u64 {
        self.len.load(AtomicOrdering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which open-list implementation the parallel search uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenKind {
    MultiQueue,
    #[default]
    TwoLevelBucket,
}

/// Façade over the two variants.
pub enum SharedOpen {
    MultiQueue(MultiQueueOpen),
    TwoLevelBucket(TwoLevelBucketOpen),
}

impl SharedOpen {
    pub fn new(kind: OpenKind, num_queues: u32, num_shards: u32, k_select: u32) -> Self {
        match kind {
            OpenKind::MultiQueue => SharedOpen::MultiQueue(MultiQueueOpen::new(num_queues)),
            OpenKind::TwoLevelBucket => {
                SharedOpen::TwoLevelBucket(TwoLevelBucketOpen::new(num_shards, k_select))
            }
        }
    }

    pub fn push(&self, qid: u32, node: OpenNode) {
        match self {
            SharedOpen::MultiQueue(mq) => mq.push(qid, node),
            SharedOpen::TwoLevelBucket(tlb) => tlb.push(node),
        }
    }

    pub fn pop(&self, qid: u32, rng: &mut SmallRng) -> Option<Popped> {
        match self {
            SharedOpen::MultiQueue(mq) => mq.pop(qid),
            SharedOpen::TwoLevelBucket(tlb) => tlb.pop(rng),
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            SharedOpen::MultiQueue(mq) => mq.len(),
            SharedOpen::TwoLevelBucket(tlb) => tlb.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn node(id: u64, g: u32, h: u32) -> OpenNode {
        OpenNode {
            id,
            g,
            h,
            op: None,
            parent: None,
        }
    }

    #[test]
    fn test_multi_queue_pop_order_single_queue() {
        let open = MultiQueueOpen::new(1);
        open.push(0, node(1, 5, 5)); // f=10
        open.push(0, node(2, 1, 2)); // f=3
        open.push(0, node(3, 2, 1)); // f=3, smaller h
        let a = open.pop(0).unwrap();
        assert_eq!(a.node.id, 3);
        let b = open.pop(0).unwrap();
        assert_eq!(b.node.id, 2);
        let c = open.pop(0).unwrap();
        assert_eq!(c.node.id, 1);
        assert!(open.pop(0).is_none());
        assert!(open.is_empty());
    }

    #[test]
    fn test_multi_queue_ties_pop_largest_id() {
        let open = MultiQueueOpen::new(1);
        open.push(0, node(10, 3, 3));
        open.push(0, node(20, 3, 3));
        assert_eq!(open.pop(0).unwrap().node.id, 20);
        assert_eq!(open.pop(0).unwrap().node.id, 10);
    }

    #[test]
    fn test_multi_queue_steals_from_other_queue() {
        let open = MultiQueueOpen::new(4);
        open.push(2, node(1, 0, 0));
        // Worker 0's home queue may be empty; the sweep must find it.
        let p = open.pop(0).unwrap();
        assert_eq!(p.node.id, 1);
        assert!(open.is_empty());
    }

    #[test]
    fn test_bucket_open_yields_global_min_eventually() {
        let open = TwoLevelBucketOpen::new(4, 2);
        let mut rng = SmallRng::seed_from_u64(42);
        for i in 0..32u64 {
            open.push(node(i, (i % 7) as u32, (i % 3) as u32));
        }
        assert_eq!(open.len(), 32);
        let mut popped = 0;
        while open.pop(&mut rng).is_some() {
            popped += 1;
        }
        assert_eq!(popped, 32);
        assert!(open.is_empty());
    }

    #[test]
    fn test_bucket_open_per_shard_order() {
        // One shard: pops come out in exact (f, h) order.
        let open = TwoLevelBucketOpen::new(1, 2);
        let mut rng = SmallRng::seed_from_u64(7);
        open.push(node(1, 9, 1));
        open.push(node(2, 0, 1));
        open.push(node(3, 4, 0));
        let keys: Vec<u32> = std::iter::from_fn(|| open.pop(&mut rng))
            .map(|p| p.node.f())
            .collect();
        assert_eq!(keys, vec![1, 4, 10]);
    }

    #[test]
    fn test_bucket_open_slab_reuse() {
        let open = TwoLevelBucketOpen::new(1, 2);
        let mut rng = SmallRng::seed_from_u64(3);
        for round in 0..3u64 {
            for i in 0..8u64 {
                open.push(node(round * 8 + i, i as u32, 0));
            }
            for _ in 0..8 {
                assert!(open.pop(&mut rng).is_some());
            }
        }
        assert!(open.is_empty());
    }

    #[test]
    fn test_shared_open_facade() {
        for kind in [OpenKind::MultiQueue, OpenKind::TwoLevelBucket] {
            let open = SharedOpen::new(kind, 2, 2, 2);
            let mut rng = SmallRng::seed_from_u64(0);
            open.push(0, node(1, 1, 1));
            open.push(1, node(2, 0, 0));
            assert_eq!(open.len(), 2);
            let mut ids: Vec<u64> = std::iter::from_fn(|| open.pop(0, &mut rng))
                .map(|p| p.node.id)
                .collect();
            ids.sort_unstable();
            assert_eq!(ids, vec![1, 2]);
        }
    }

    #[test]
    fn test_concurrent_push_pop_conserves_nodes() {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;
        use std::thread;

        let open = Arc::new(TwoLevelBucketOpen::new(4, 2));
        let popped = Arc::new(AtomicU64::new(0));
        let mut handles = vec![];
        for t in 0..4u64 {
            let open = Arc::clone(&open);
            let popped = Arc::clone(&popped);
            handles.push(thread::spawn(move || {
                let mut rng = SmallRng::seed_from_u64(t);
                for i in 0..250u64 {
                    open.push(node(t * 1000 + i, (i % 10) as u32, 0));
                    if i % 2 == 0 {
                        if open.pop(&mut rng).is_some() {
                            popped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let mut rng = SmallRng::seed_from_u64(99);
        let mut drained = 0;
        while open.pop(&mut rng).is_some() {
            drained += 1;
        }
        assert_eq!(popped.load(Ordering::Relaxed) + drained, 1000);
    }
}
