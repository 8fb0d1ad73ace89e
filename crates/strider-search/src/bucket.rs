//! Monotone, index-addressable bucket priority queues over packed keys.
//!
//! A key packs `(f, h)` into one `u32` with `f` in the high 16 bits, so
//! lexicographic `(f, h)` order is plain integer order. [`BucketPq`] keeps
//! one bucket per key value and suits small key ranges; [`TwoLevelBucketPq`]
//! splits the key back into an f-layer and an h-slot and tracks non-empty
//! layers/slots in bitsets, so `extract_min` is O(1) in the common case.
//!
//! Both queues keep a positions directory (`value -> owning bucket + index`)
//! for O(1) `contains` / `key_of` / `remove` / key changes. All precondition
//! violations (inserting a present value, extracting from an empty queue,
//! a growing `decrease_key`) are programmer errors and panic.

/// Bits reserved for the `h` half of a packed key.
pub const H_BITS: u32 = 16;
/// Mask for one 16-bit half.
pub const KEY_MASK: u32 = 0xFFFF;
/// Pseudo-infinity for heuristic values: one past the largest packable `h`,
/// so saturation pins unreachable states to the far edge of the key space.
pub const H_INF: u32 = 1 << H_BITS;

/// Pack `(f, h)` with ascending-h tie-breaking. Both halves saturate to
/// 16 bits.
#[inline]
pub fn pack_fh_asc(f: u32, h: u32) -> u32 {
    (f.min(KEY_MASK) << H_BITS) | h.min(KEY_MASK)
}

/// Pack `(f, h)` so that larger `h` sorts first within a tied `f`.
/// `h_max` is the domain-dependent upper bound on `h`.
#[inline]
pub fn pack_fh_desc(f: u32, h: u32, h_max: u32) -> u32 {
    pack_fh_asc(f, h_max.saturating_sub(h))
}

#[inline]
pub fn unpack_f(key: u32) -> u32 {
    key >> H_BITS
}

#[inline]
pub fn unpack_h(key: u32) -> u32 {
    key & KEY_MASK
}

/// Growable bitset with a first-nonzero-word hint.
///
/// `min_word` always names the first word with a set bit (`None` when
/// empty), so `find_first` is one `trailing_zeros` in the common case and a
/// forward word scan only after clearing the current minimum.
#[derive(Default)]
struct Bitset {
    words: Vec<u64>,
    min_word: Option<usize>,
}

impl Bitset {
    fn any(&self) -> bool {
        self.min_word.is_some()
    }

    fn test(&self, i: usize) -> bool {
        let wi = i >> 6;
        self.words.get(wi).is_some_and(|w| (w >> (i & 63)) & 1 != 0)
    }

    fn set(&mut self, i: usize) {
        let wi = i >> 6;
        if wi >= self.words.len() {
            self.words.resize(wi + 1, 0);
        }
        let was_zero = self.words[wi] == 0;
        self.words[wi] |= 1u64 << (i & 63);
        if was_zero && self.min_word.is_none_or(|mw| wi < mw) {
            self.min_word = Some(wi);
        }
    }

    fn clear(&mut self, i: usize) {
        let wi = i >> 6;
        if wi >= self.words.len() {
            return;
        }
        self.words[wi] &= !(1u64 << (i & 63));
        if self.words[wi] == 0 && self.min_word == Some(wi) {
            self.advance_min_word(wi);
        }
    }

    /// Index of the lowest set bit.
    fn find_first(&self) -> Option<usize> {
        let wi = self.min_word?;
        let word = self.words[wi];
        debug_assert_ne!(word, 0, "min_word hint points at a zero word");
        Some((wi << 6) + word.trailing_zeros() as usize)
    }

    fn clear_all(&mut self) {
        self.words.clear();
        self.min_word = None;
    }

    fn advance_min_word(&mut self, from: usize) {
        self.min_word = (from..self.words.len()).find(|&wi| self.words[wi] != 0);
    }
}

/// Positions-directory entry shared by both queues.
#[derive(Clone, Copy, Default)]
struct Pos {
    key: u32,
    idx: u32,
    present: bool,
}

/// Single-level bucket queue: one bucket per key value (LIFO within a
/// bucket), a running minimum-key cursor. Storage is proportional to the
/// largest key ever inserted, so this variant is only suitable for small
/// key spaces (e.g. plain g-keyed uniform cost search).
#[derive(Default)]
pub struct BucketPq {
    buckets: Vec<Vec<u32>>,
    pos: Vec<Pos>,
    min_key: Option<u32>,
    len: u32,
}

impl BucketPq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    /// Insert `v` with key `key`. Panics if `v` is already present.
    pub fn insert(&mut self, v: u32, key: u32) {
        self.ensure_bucket(key);
        self.ensure_pos(v);

        let p = &mut self.pos[v as usize];
        assert!(!p.present, "BucketPq::insert: value {v} already present");
        let bucket = &mut self.buckets[key as usize];
        p.key = key;
        p.idx = bucket.len() as u32;
        p.present = true;
        bucket.push(v);

        if self.min_key.is_none_or(|mk| key < mk) {
            self.min_key = Some(key);
        }
        self.len += 1;
    }

    /// Remove and return a `(value, key)` pair with the minimal key.
    /// Ties pop in LIFO order. Panics if the queue is empty.
    pub fn extract_min(&mut self) -> (u32, u32) {
        assert!(self.len > 0, "BucketPq::extract_min: queue is empty");
        self.advance_min();
        let key = self.min_key.expect("non-empty queue has a minimum");
        let bucket = &mut self.buckets[key as usize];
        let v = bucket.pop().expect("min bucket is non-empty");
        self.pos[v as usize].present = false;
        self.len -= 1;
        if self.buckets[key as usize].is_empty() {
            self.advance_min();
        }
        (v, key)
    }

    /// Move `v` to a smaller key. Panics if absent or if `new_key` grows.
    pub fn decrease_key(&mut self, v: u32, new_key: u32) {
        self.change_key(v, new_key, false);
    }

    /// Move `v` to a larger (or smaller) key. Panics if absent.
    pub fn increase_key(&mut self, v: u32, new_key: u32) {
        self.change_key(v, new_key, true);
    }

    pub fn contains(&self, v: u32) -> bool {
        self.pos.get(v as usize).is_some_and(|p| p.present)
    }

    pub fn key_of(&self, v: u32) -> Option<u32> {
        let p = self.pos.get(v as usize)?;
        p.present.then_some(p.key)
    }

    /// Remove `v` if present (no-op otherwise): swap-with-last inside the
    /// owning bucket.
    pub fn remove(&mut self, v: u32) {
        if !self.contains(v) {
            return;
        }
        let p = self.pos[v as usize];
        let bucket = &mut self.buckets[p.key as usize];
        let last = bucket.len() - 1;
        if (p.idx as usize) < last {
            let moved = bucket[last];
            bucket[p.idx as usize] = moved;
            self.pos[moved as usize].idx = p.idx;
        }
        bucket.pop();
        self.pos[v as usize].present = false;
        self.len -= 1;
        if self.buckets[p.key as usize].is_empty() && self.min_key == Some(p.key) {
            self.advance_min();
        }
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.pos.clear();
        self.min_key = None;
        self.len = 0;
    }

    fn ensure_bucket(&mut self, key: u32) {
        if key as usize >= self.buckets.len() {
            self.buckets.resize(key as usize + 1, Vec::new());
        }
    }

    fn ensure_pos(&mut self, v: u32) {
        if v as usize >= self.pos.len() {
            self.pos.resize(v as usize + 1, Pos::default());
        }
    }

    fn advance_min(&mut self) {
        if self.len == 0 {
            self.min_key = None;
            return;
        }
        let start = self.min_key.unwrap_or(0) as usize;
        let start = if start >= self.buckets.len() { 0 } else { start };
        self.min_key = (start..self.buckets.len())
            .find(|&k| !self.buckets[k].is_empty())
            .map(|k| k as u32);
    }

    fn change_key(&mut self, v: u32, new_key: u32, allow_increase: bool) {
        assert!(
            self.contains(v),
            "BucketPq::change_key: value {v} not present"
        );
        let old_key = self.pos[v as usize].key;
        if !allow_increase {
            assert!(
                new_key <= old_key,
                "BucketPq::decrease_key: new key {new_key} > old key {old_key}"
            );
        }
        if new_key == old_key {
            return;
        }

        // Unlink from the old bucket by swap-with-last.
        let idx = self.pos[v as usize].idx;
        let bucket = &mut self.buckets[old_key as usize];
        let last = bucket.len() - 1;
        if (idx as usize) < last {
            let moved = bucket[last];
            bucket[idx as usize] = moved;
            self.pos[moved as usize].idx = idx;
        }
        bucket.pop();

        self.ensure_bucket(new_key);
        let bucket = &mut self.buckets[new_key as usize];
        let p = &mut self.pos[v as usize];
        p.key = new_key;
        p.idx = bucket.len() as u32;
        bucket.push(v);

        if self.min_key.is_none_or(|mk| new_key < mk) {
            self.min_key = Some(new_key);
        }
        let mk = self.min_key.expect("queue is non-empty");
        if self.buckets[mk as usize].is_empty() {
            self.advance_min();
        }
    }
}

/// Two-level positions entry: which f-layer, which h-slot, where inside.
#[derive(Clone, Copy, Default)]
struct Pos2 {
    f: u32,
    h: u32,
    idx: u32,
    present: bool,
}

/// One f-layer: its h-slot buckets plus the non-empty-slot bitset.
#[derive(Default)]
struct HLayer {
    buckets: Vec<Vec<u32>>,
    hbits: Bitset,
}

impl HLayer {
    fn ensure_slot(&mut self, h: u32) {
        if h as usize >= self.buckets.len() {
            self.buckets.resize(h as usize + 1, Vec::new());
        }
    }
}

/// Two-level bucket queue keyed by packed `(f, h)`.
///
/// The outer level is indexed by `f`, the inner by `h`; two bitsets with
/// first-nonzero-word hints locate the minimal non-empty bucket without
/// scanning. Within one `(f, h)` bucket extraction is LIFO.
#[derive(Default)]
pub struct TwoLevelBucketPq {
    layers: Vec<HLayer>,
    fbits: Bitset,
    pos: Vec<Pos2>,
    len: u64,
}

impl TwoLevelBucketPq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    /// Insert `v` with packed key `key`. Panics if `v` is already present.
    pub fn insert(&mut self, v: u32, key: u32) {
        self.ensure_pos(v);
        assert!(
            !self.pos[v as usize].present,
            "TwoLevelBucketPq::insert: value {v} already present"
        );

        let f = unpack_f(key);
        let h = unpack_h(key);
        self.ensure_layer(f);
        self.layers[f as usize].ensure_slot(h);

        let bucket = &mut self.layers[f as usize].buckets[h as usize];
        self.pos[v as usize] = Pos2 {
            f,
            h,
            idx: bucket.len() as u32,
            present: true,
        };
        bucket.push(v);

        self.layers[f as usize].hbits.set(h as usize);
        self.fbits.set(f as usize);
        self.len += 1;
    }

    /// Remove and return the `(value, key)` pair minimal under
    /// lexicographic `(f, h)`; LIFO within a bucket. Panics when empty.
    pub fn extract_min(&mut self) -> (u32, u32) {
        assert!(self.len > 0, "TwoLevelBucketPq::extract_min: queue is empty");
        let f = self.fbits.find_first().expect("fbits non-empty");
        let layer = &mut self.layers[f];
        let h = layer.hbits.find_first().expect("layer marked non-empty");

        let bucket = &mut layer.buckets[h];
        let v = bucket.pop().expect("slot marked non-empty");
        self.pos[v as usize].present = false;
        self.len -= 1;

        if bucket.is_empty() {
            layer.hbits.clear(h);
            if !layer.hbits.any() {
                self.fbits.clear(f);
            }
        }
        (v, pack_fh_asc(f as u32, h as u32))
    }

    pub fn decrease_key(&mut self, v: u32, new_key: u32) {
        self.change_key(v, new_key, false);
    }

    pub fn increase_key(&mut self, v: u32, new_key: u32) {
        self.change_key(v, new_key, true);
    }

    pub fn contains(&self, v: u32) -> bool {
        self.pos.get(v as usize).is_some_and(|p| p.present)
    }

    pub fn key_of(&self, v: u32) -> Option<u32> {
        let p = self.pos.get(v as usize)?;
        p.present.then(|| pack_fh_asc(p.f, p.h))
    }

    /// Remove `v` if present (no-op otherwise).
    pub fn remove(&mut self, v: u32) {
        if !self.contains(v) {
            return;
        }
        let p = self.pos[v as usize];
        self.unlink(p);
        self.pos[v as usize].present = false;
        self.len -= 1;
    }

    pub fn clear(&mut self) {
        self.layers.clear();
        self.fbits.clear_all();
        self.pos.clear();
        self.len = 0;
    }

    fn ensure_pos(&mut self, v: u32) {
        if v as usize >= self.pos.len() {
            self.pos.resize(v as usize + 1, Pos2::default());
        }
    }

    fn ensure_layer(&mut self, f: u32) {
        if f as usize >= self.layers.len() {
            self.layers.resize_with(f as usize + 1, HLayer::default);
        }
    }

    /// Swap-with-last removal from the bucket `p` points into, with bitset
    /// maintenance.
    fn unlink(&mut self, p: Pos2) {
        let layer = &mut self.layers[p.f as usize];
        let bucket = &mut layer.buckets[p.h as usize];
        let last = bucket.len() - 1;
        if (p.idx as usize) < last {
            let moved = bucket[last];
            bucket[p.idx as usize] = moved;
            self.pos[moved as usize].idx = p.idx;
        }
        bucket.pop();
        if bucket.is_empty() {
            layer.hbits.clear(p.h as usize);
            if !layer.hbits.any() {
                self.fbits.clear(p.f as usize);
            }
        }
    }

    fn change_key(&mut self, v: u32, new_key: u32, allow_increase: bool) {
        assert!(
            self.contains(v),
            "TwoLevelBucketPq::change_key: value {v} not present"
        );
        let p = self.pos[v as usize];
        let old_key = pack_fh_asc(p.f, p.h);
        if !allow_increase {
            assert!(
                new_key <= old_key,
                "TwoLevelBucketPq::decrease_key: new key {new_key:#x} > old key {old_key:#x}"
            );
        }
        let nf = unpack_f(new_key);
        let nh = unpack_h(new_key);
        if nf == p.f && nh == p.h {
            return;
        }

        self.unlink(p);

        self.ensure_layer(nf);
        self.layers[nf as usize].ensure_slot(nh);
        let bucket = &mut self.layers[nf as usize].buckets[nh as usize];
        self.pos[v as usize] = Pos2 {
            f: nf,
            h: nh,
            idx: bucket.len() as u32,
            present: true,
        };
        bucket.push(v);
        self.layers[nf as usize].hbits.set(nh as usize);
        self.fbits.set(nf as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pack_unpack_saturates() {
        assert_eq!(pack_fh_asc(3, 9), (3 << 16) | 9);
        assert_eq!(unpack_f(pack_fh_asc(3, 9)), 3);
        assert_eq!(unpack_h(pack_fh_asc(3, 9)), 9);
        // Inputs outside 16 bits saturate to the representable edge.
        assert_eq!(unpack_f(pack_fh_asc(0x2_0000, 5)), 0xFFFF);
        assert_eq!(unpack_h(pack_fh_asc(5, H_INF)), 0xFFFF);
        assert_eq!(unpack_h(pack_fh_asc(5, u32::MAX)), 0xFFFF);
    }

    #[test]
    fn test_pack_desc_reverses_h_order() {
        let h_max = 100;
        let low_h = pack_fh_desc(7, 10, h_max);
        let high_h = pack_fh_desc(7, 90, h_max);
        assert!(high_h < low_h);
        // h beyond h_max clamps to slot zero.
        assert_eq!(unpack_h(pack_fh_desc(7, 200, h_max)), 0);
    }

    #[test]
    fn test_extract_min_order() {
        let mut pq = TwoLevelBucketPq::new();
        pq.insert(3, pack_fh_asc(5, 7));
        pq.insert(1, pack_fh_asc(3, 9));
        pq.insert(2, pack_fh_asc(5, 2));
        assert_eq!(pq.extract_min(), (1, pack_fh_asc(3, 9)));
        assert_eq!(pq.extract_min(), (2, pack_fh_asc(5, 2)));
        assert_eq!(pq.extract_min(), (3, pack_fh_asc(5, 7)));
        assert!(pq.is_empty());
    }

    #[test]
    fn test_decrease_key_moves_to_front() {
        let mut pq = TwoLevelBucketPq::new();
        pq.insert(7, pack_fh_asc(10, 5));
        pq.decrease_key(7, pack_fh_asc(4, 1));
        assert_eq!(pq.extract_min(), (7, pack_fh_asc(4, 1)));
    }

    #[test]
    fn test_increase_key() {
        let mut pq = TwoLevelBucketPq::new();
        pq.insert(1, pack_fh_asc(2, 2));
        pq.insert(2, pack_fh_asc(3, 0));
        pq.increase_key(1, pack_fh_asc(9, 9));
        assert_eq!(pq.extract_min().0, 2);
        assert_eq!(pq.extract_min(), (1, pack_fh_asc(9, 9)));
    }

    #[test]
    fn test_contains_and_key_of() {
        let mut pq = TwoLevelBucketPq::new();
        assert!(!pq.contains(4));
        assert_eq!(pq.key_of(4), None);
        pq.insert(4, pack_fh_asc(1, 1));
        assert!(pq.contains(4));
        assert_eq!(pq.key_of(4), Some(pack_fh_asc(1, 1)));
        pq.remove(4);
        assert!(!pq.contains(4));
        assert_eq!(pq.len(), 0);
    }

    #[test]
    fn test_remove_middle_of_bucket() {
        let mut pq = TwoLevelBucketPq::new();
        for v in 0..4 {
            pq.insert(v, pack_fh_asc(2, 2));
        }
        pq.remove(1);
        let mut out = Vec::new();
        while !pq.is_empty() {
            out.push(pq.extract_min().0);
        }
        out.sort_unstable();
        assert_eq!(out, vec![0, 2, 3]);
    }

    #[test]
    fn test_lifo_within_bucket() {
        let mut pq = TwoLevelBucketPq::new();
        pq.insert(1, pack_fh_asc(4, 4));
        pq.insert(2, pack_fh_asc(4, 4));
        pq.insert(3, pack_fh_asc(4, 4));
        assert_eq!(pq.extract_min().0, 3);
        assert_eq!(pq.extract_min().0, 2);
        assert_eq!(pq.extract_min().0, 1);
    }

    #[test]
    fn test_clear() {
        let mut pq = TwoLevelBucketPq::new();
        pq.insert(1, pack_fh_asc(1, 1));
        pq.insert(2, pack_fh_asc(2, 2));
        pq.clear();
        assert!(pq.is_empty());
        assert!(!pq.contains(1));
        pq.insert(1, pack_fh_asc(0, 0));
        assert_eq!(pq.extract_min(), (1, pack_fh_asc(0, 0)));
    }

    #[test]
    #[should_panic(expected = "already present")]
    fn test_double_insert_panics() {
        let mut pq = TwoLevelBucketPq::new();
        pq.insert(1, pack_fh_asc(1, 1));
        pq.insert(1, pack_fh_asc(2, 2));
    }

    #[test]
    #[should_panic(expected = "queue is empty")]
    fn test_extract_from_empty_panics() {
        TwoLevelBucketPq::new().extract_min();
    }

    #[test]
    #[should_panic(expected = "new key")]
    fn test_decrease_key_growing_panics() {
        let mut pq = TwoLevelBucketPq::new();
        pq.insert(1, pack_fh_asc(1, 1));
        pq.decrease_key(1, pack_fh_asc(5, 0));
    }

    #[test]
    fn test_flat_bucket_pq_basics() {
        let mut pq = BucketPq::new();
        pq.insert(10, 7);
        pq.insert(11, 3);
        pq.insert(12, 7);
        assert_eq!(pq.extract_min(), (11, 3));
        pq.decrease_key(12, 1);
        assert_eq!(pq.extract_min(), (12, 1));
        assert_eq!(pq.extract_min(), (10, 7));
        assert!(pq.is_empty());
    }

    #[test]
    fn test_flat_bucket_pq_remove_and_reinsert() {
        let mut pq = BucketPq::new();
        pq.insert(1, 5);
        pq.remove(1);
        assert!(pq.is_empty());
        pq.insert(1, 2);
        assert_eq!(pq.key_of(1), Some(2));
    }

    /// Random insert/extract interleavings agree with a sorted model.
    #[test]
    fn test_two_level_matches_model() {
        proptest!(|(keys in proptest::collection::vec((0u32..200, 0u32..200), 1..60))| {
            let mut pq = TwoLevelBucketPq::new();
            let mut model: Vec<u32> = Vec::new();
            for (v, (f, h)) in keys.iter().enumerate() {
                let key = pack_fh_asc(*f, *h);
                pq.insert(v as u32, key);
                model.push(key);
            }
            model.sort_unstable();
            let mut popped = Vec::new();
            while !pq.is_empty() {
                popped.push(pq.extract_min().1);
            }
            prop_assert_eq!(popped, model);
        });
    }

    /// The positions directory stays consistent through key changes.
    #[test]
    fn test_positions_consistent_under_key_changes() {
        proptest!(|(ops in proptest::collection::vec((0u32..20, 0u32..64, 0u32..64), 1..80))| {
            let mut pq = TwoLevelBucketPq::new();
            for (v, f, h) in ops {
                let key = pack_fh_asc(f, h);
                match pq.key_of(v) {
                    None => pq.insert(v, key),
                    Some(old) if key <= old => pq.decrease_key(v, key),
                    Some(_) => pq.increase_key(v, key),
                }
                prop_assert_eq!(pq.key_of(v), Some(key));
            }
            let mut last = 0;
            while !pq.is_empty() {
                let (_, key) = pq.extract_min();
                prop_assert!(key >= last);
                last = key;
            }
        });
    }
}
