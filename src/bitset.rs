//! Thread-safe bitsets: atomic OR for set/union, CAS-based
//! test-and-set, used for the `visited`/`keep` marks in cleaning and
//! supernode enumeration, and for `GraphStore`'s per-color presence
//! bits.

use std::sync::atomic::{AtomicU64, Ordering};

/// A fixed-size bitset backed by `AtomicU64` words, safe to mutate
/// concurrently from multiple threads as long as callers only need
/// set/test/test-and-set semantics (no concurrent clear-and-set races).
pub struct AtomicBitset {
    words: Vec<AtomicU64>,
    len_bits: usize,
}

impl AtomicBitset {
    /// Create a new bitset with room for at least `len_bits` bits, all
    /// initially clear.
    pub fn new(len_bits: usize) -> Self {
        let nwords = len_bits.div_ceil(64).max(1);
        let mut words = Vec::with_capacity(nwords);
        words.resize_with(nwords, || AtomicU64::new(0));
        Self { words, len_bits }
    }

    #[inline]
    pub fn len_bits(&self) -> usize {
        self.len_bits
    }

    #[inline]
    fn locate(&self, bit: usize) -> (usize, u64) {
        (bit / 64, 1u64 << (bit % 64))
    }

    /// Test whether `bit` is set.
    #[inline]
    pub fn get(&self, bit: usize) -> bool {
        let (w, mask) = self.locate(bit);
        self.words[w].load(Ordering::Acquire) & mask != 0
    }

    /// Set `bit` via atomic OR. Idempotent.
    #[inline]
    pub fn set(&self, bit: usize) {
        let (w, mask) = self.locate(bit);
        self.words[w].fetch_or(mask, Ordering::AcqRel);
    }

    /// Clear `bit` via atomic AND.
    #[inline]
    pub fn clear(&self, bit: usize) {
        let (w, mask) = self.locate(bit);
        self.words[w].fetch_and(!mask, Ordering::AcqRel);
    }

    /// Atomically set `bit` and return whether it was already set
    /// beforehand (a CAS loop — the classic test-and-set primitive).
    /// Used by `supernodes_iterate` to guarantee each supernode is
    /// emitted exactly once under concurrent iteration.
    #[inline]
    pub fn test_and_set(&self, bit: usize) -> bool {
        let (w, mask) = self.locate(bit);
        let prev = self.words[w].fetch_or(mask, Ordering::AcqRel);
        prev & mask != 0
    }

    /// Clear every bit. Not safe to call concurrently with readers.
    pub fn clear_all(&self) {
        for w in &self.words {
            w.store(0, Ordering::Release);
        }
    }

    /// Count of set bits.
    pub fn count_ones(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Acquire).count_ones() as usize)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn set_get_clear() {
        let bs = AtomicBitset::new(128);
        assert!(!bs.get(5));
        bs.set(5);
        assert!(bs.get(5));
        bs.clear(5);
        assert!(!bs.get(5));
    }

    #[test]
    fn test_and_set_reports_prior_state() {
        let bs = AtomicBitset::new(8);
        assert!(!bs.test_and_set(3));
        assert!(bs.test_and_set(3));
    }

    #[test]
    fn concurrent_test_and_set_single_winner() {
        let bs = Arc::new(AtomicBitset::new(8));
        let mut wins = 0usize;
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bs = Arc::clone(&bs);
                thread::spawn(move || !bs.test_and_set(0))
            })
            .collect();
        for h in handles {
            if h.join().unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[test]
    fn count_ones_matches_sets() {
        let bs = AtomicBitset::new(100);
        for b in [1, 2, 3, 99] {
            bs.set(b);
        }
        assert_eq!(bs.count_ones(), 4);
    }
}
