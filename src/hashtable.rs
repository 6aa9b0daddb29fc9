//! Concurrent canonical k-mer hash table — the graph's spine.
//!
//! Open-addressed, power-of-two-sized table of `(BinaryKmer, occupied)`
//! slots partitioned into fixed-size buckets. Each bucket is guarded by
//! its own lock, so concurrent ingestion touching different buckets
//! never contends; a stable integer key (`hkey`, `bucket*bucket_size +
//! slot`) is handed back on insertion so satellite arrays ([`crate::
//! graph_store::GraphStore`]'s edges/coverage) can be indexed without
//! indirection. Capacity is fixed at construction — the table never
//! rehashes.

use crate::error::{GraphError, Result};
use crate::kmer::BinaryKmer;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Fraction of slots a table is sized to actually use; the rest is
/// headroom so bucket insertion rarely (ideally never) saturates.
pub const IDEAL_OCCUPANCY: f64 = 0.75;

/// Fixed number of slots per bucket.
pub const DEFAULT_BUCKET_SIZE: usize = 256;

/// A stable integer key assigned by the table at insertion. Unique for
/// the table's lifetime and valid until the node is pruned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HKey(pub usize);

/// Sentinel indicating "no such node".
pub const HKEY_NONE: HKey = HKey(usize::MAX);

impl HKey {
    #[inline]
    pub fn is_none(self) -> bool {
        self == HKEY_NONE
    }

    #[inline]
    pub fn is_some(self) -> bool {
        !self.is_none()
    }
}

struct Bucket {
    slots: RwLock<Vec<Option<BinaryKmer>>>,
}

impl Bucket {
    fn new(bucket_size: usize) -> Self {
        Self {
            slots: RwLock::new(vec![None; bucket_size]),
        }
    }
}

/// The concurrent canonical k-mer hash table.
pub struct KmerHashTable {
    kmer_size: usize,
    bucket_size: usize,
    buckets: Vec<Bucket>,
    bucket_mask: usize,
    num_kmers: AtomicU64,
}

impl KmerHashTable {
    /// Allocate a table for k-mers of size `kmer_size`, sized to hold
    /// at least `capacity_hint` entries at [`IDEAL_OCCUPANCY`] load.
    pub fn new(kmer_size: usize, capacity_hint: usize) -> Self {
        let bucket_size = DEFAULT_BUCKET_SIZE;
        let needed_slots = ((capacity_hint.max(1) as f64) / IDEAL_OCCUPANCY).ceil() as usize;
        let num_buckets = needed_slots.div_ceil(bucket_size).next_power_of_two().max(1);

        let mut buckets = Vec::with_capacity(num_buckets);
        buckets.resize_with(num_buckets, || Bucket::new(bucket_size));

        Self {
            kmer_size,
            bucket_size,
            buckets,
            bucket_mask: num_buckets - 1,
            num_kmers: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// Total slot capacity (`num_buckets * bucket_size`). Fixed for the
    /// table's lifetime.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buckets.len() * self.bucket_size
    }

    #[inline]
    fn bucket_index(&self, canon: &BinaryKmer) -> usize {
        (canon.hash64() as usize) & self.bucket_mask
    }

    #[inline]
    fn to_hkey(&self, bucket_idx: usize, slot_idx: usize) -> HKey {
        HKey(bucket_idx * self.bucket_size + slot_idx)
    }

    /// Insert the canonical form of `bk` if absent, returning its
    /// stable key either way. `*inserted` reports whether this call
    /// performed the insertion.
    pub fn find_or_insert(&self, bk: &BinaryKmer, inserted: &mut bool) -> Result<HKey> {
        let canon = bk.canonical();
        let bucket_idx = self.bucket_index(&canon);
        let mut slots = self.buckets[bucket_idx].slots.write().unwrap();

        if let Some(i) = slots.iter().position(|s| s.as_ref() == Some(&canon)) {
            *inserted = false;
            return Ok(self.to_hkey(bucket_idx, i));
        }

        match slots.iter().position(|s| s.is_none()) {
            Some(i) => {
                slots[i] = Some(canon);
                self.num_kmers.fetch_add(1, Ordering::AcqRel);
                *inserted = true;
                Ok(self.to_hkey(bucket_idx, i))
            }
            None => Err(GraphError::FullBucket { bucket: bucket_idx }),
        }
    }

    /// Look up the canonical form of `bk`. Returns [`HKEY_NONE`] if
    /// absent. Only takes a shared (read) lock on the bucket, so
    /// concurrent reads never block each other.
    pub fn find(&self, bk: &BinaryKmer) -> HKey {
        let canon = bk.canonical();
        let bucket_idx = self.bucket_index(&canon);
        let slots = self.buckets[bucket_idx].slots.read().unwrap();
        match slots.iter().position(|s| s.as_ref() == Some(&canon)) {
            Some(i) => self.to_hkey(bucket_idx, i),
            None => HKEY_NONE,
        }
    }

    /// Fetch the canonical kmer stored at `hkey`, if the slot is
    /// occupied.
    pub fn kmer_at(&self, hkey: HKey) -> Option<BinaryKmer> {
        if hkey.is_none() {
            return None;
        }
        let (bucket_idx, slot_idx) = (hkey.0 / self.bucket_size, hkey.0 % self.bucket_size);
        let slots = self.buckets.get(bucket_idx)?.slots.read().unwrap();
        slots.get(slot_idx)?.clone()
    }

    /// Clear the slot at `hkey` under its bucket lock. The slot may be
    /// reused by a later insert.
    pub fn delete(&self, hkey: HKey) {
        if hkey.is_none() {
            return;
        }
        let (bucket_idx, slot_idx) = (hkey.0 / self.bucket_size, hkey.0 % self.bucket_size);
        let mut slots = self.buckets[bucket_idx].slots.write().unwrap();
        if slots[slot_idx].take().is_some() {
            self.num_kmers.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Number of occupied slots. Equal to the number of distinct
    /// `hkey`s returned by [`Self::iterate`].
    pub fn count_kmers(&self) -> u64 {
        self.num_kmers.load(Ordering::Acquire)
    }

    /// Sequential traversal of occupied slots in slot order.
    pub fn iterate<F: FnMut(HKey, &BinaryKmer)>(&self, mut f: F) {
        for (bucket_idx, bucket) in self.buckets.iter().enumerate() {
            let slots = bucket.slots.read().unwrap();
            for (slot_idx, slot) in slots.iter().enumerate() {
                if let Some(bk) = slot {
                    f(self.to_hkey(bucket_idx, slot_idx), bk);
                }
            }
        }
    }

    /// Partition buckets contiguously among `nthreads` workers and
    /// traverse each partition independently. `f` must be safe to call
    /// concurrently from multiple threads.
    pub fn iterate_mt<F>(&self, nthreads: usize, f: F)
    where
        F: Fn(HKey, &BinaryKmer) + Sync,
    {
        let nthreads = nthreads.max(1);
        let nbuckets = self.buckets.len();
        let chunk = nbuckets.div_ceil(nthreads).max(1);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(nthreads)
            .build()
            .expect("failed to build worker pool");

        pool.install(|| {
            (0..nbuckets)
                .collect::<Vec<_>>()
                .chunks(chunk)
                .collect::<Vec<_>>()
                .into_par_iter()
                .for_each(|range| {
                    for &bucket_idx in range {
                        let slots = self.buckets[bucket_idx].slots.read().unwrap();
                        for (slot_idx, slot) in slots.iter().enumerate() {
                            if let Some(bk) = slot {
                                f(self.to_hkey(bucket_idx, slot_idx), bk);
                            }
                        }
                    }
                });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_k3_insert_lookup() {
        let table = KmerHashTable::new(3, 64);
        let mut inserted = false;
        let bk = BinaryKmer::from_str("ACG", 3).unwrap();
        let hkey = table.find_or_insert(&bk, &mut inserted).unwrap();
        assert!(inserted);

        let rc = BinaryKmer::from_str("CGT", 3).unwrap();
        assert_eq!(table.find(&bk), hkey);
        assert_eq!(table.find(&rc), hkey);
        assert_eq!(table.count_kmers(), 1);
    }

    #[test]
    fn reinsert_does_not_duplicate() {
        let table = KmerHashTable::new(3, 64);
        let bk = BinaryKmer::from_str("ACG", 3).unwrap();

        let mut i1 = false;
        let h1 = table.find_or_insert(&bk, &mut i1).unwrap();
        assert!(i1);

        let mut i2 = false;
        let h2 = table.find_or_insert(&bk, &mut i2).unwrap();
        assert!(!i2);
        assert_eq!(h1, h2);
        assert_eq!(table.count_kmers(), 1);
    }

    #[test]
    fn delete_frees_slot_for_reuse() {
        let table = KmerHashTable::new(3, 64);
        let bk = BinaryKmer::from_str("ACG", 3).unwrap();
        let mut inserted = false;
        let hkey = table.find_or_insert(&bk, &mut inserted).unwrap();

        table.delete(hkey);
        assert_eq!(table.count_kmers(), 0);
        assert_eq!(table.find(&bk), HKEY_NONE);

        let other = BinaryKmer::from_str("TTT", 3).unwrap();
        let mut inserted2 = false;
        let _ = table.find_or_insert(&other, &mut inserted2).unwrap();
        assert!(inserted2);
        assert_eq!(table.count_kmers(), 1);
    }

    #[test]
    fn count_consistency_with_iteration() {
        let table = KmerHashTable::new(3, 64);
        for s in ["ACG", "TTT", "GGG", "AAA"] {
            let bk = BinaryKmer::from_str(s, 3).unwrap();
            let mut inserted = false;
            table.find_or_insert(&bk, &mut inserted).unwrap();
        }

        let mut seen = Vec::new();
        table.iterate(|hkey, _bk| seen.push(hkey));
        assert_eq!(seen.len() as u64, table.count_kmers());

        seen.sort();
        seen.dedup();
        assert_eq!(seen.len() as u64, table.count_kmers());
    }

    #[test]
    fn iterate_mt_visits_every_kmer_exactly_once() {
        let table = KmerHashTable::new(11, 4096);
        let mut expect = std::collections::HashSet::new();
        let bases = "ACGT";
        for a in bases.chars() {
            for b in bases.chars() {
                for c in bases.chars() {
                    for d in bases.chars() {
                        let s: String = [a, b, c, d].iter().collect::<String>().repeat(3);
                        let s = &s[..11];
                        let bk = BinaryKmer::from_str(s, 11).unwrap();
                        let mut inserted = false;
                        let hkey = table.find_or_insert(&bk, &mut inserted).unwrap();
                        expect.insert(hkey);
                    }
                }
            }
        }

        let seen = std::sync::Mutex::new(Vec::new());
        table.iterate_mt(4, |hkey, _bk| {
            seen.lock().unwrap().push(hkey);
        });
        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), expect.len());
    }
}
