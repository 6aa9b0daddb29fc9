//! Fixed-width packed 2-bit DNA k-mers.
//!
//! A [`BinaryKmer`] stores `k` bases (`k` in `[3, 255]`), 2 bits per
//! base (`A=0, C=1, G=2, T=3`), packed into `ceil(k*2/64)` 64-bit words.
//! Bases are packed MSB-first within the word array so that unsigned
//! lexicographic order on the words matches lexicographic order on the
//! base sequence (needed for `canonical`'s tie-break).

use crate::error::{GraphError, Result};
use std::fmt;

pub const MIN_KMER_SIZE: usize = 3;
pub const MAX_KMER_SIZE: usize = 255;

const BITS_PER_BASE: usize = 2;
const BASES_PER_WORD: usize = 32;

/// Number of 64-bit words needed to store `k` bases.
#[inline]
pub const fn words_for_kmer_size(k: usize) -> usize {
    (k * BITS_PER_BASE).div_ceil(64)
}

#[inline]
fn base_to_code(b: u8) -> Option<u8> {
    match b {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

#[inline]
fn code_to_base(c: u8) -> u8 {
    match c & 0x3 {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        _ => b'T',
    }
}

#[inline]
const fn complement_code(c: u8) -> u8 {
    // A<->T (0<->3), C<->G (1<->2): complement is `3 - c`.
    3 - (c & 0x3)
}

/// An immutable packed sequence of `k` DNA bases.
///
/// Invariant upheld by all table-facing APIs (not by this type itself,
/// which is a plain value): stored kmers are always canonical.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BinaryKmer {
    k: usize,
    words: Vec<u64>,
}

impl fmt::Debug for BinaryKmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinaryKmer({})", self.to_string_lossy())
    }
}

impl BinaryKmer {
    /// Number of bases.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Raw packed words, most-significant word first. Exposed for
    /// hashing and binary-format I/O.
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Build a zero-initialized kmer of the given size (all bases `A`).
    pub fn zero(k: usize) -> Result<Self> {
        if !(MIN_KMER_SIZE..=MAX_KMER_SIZE).contains(&k) {
            return Err(GraphError::InvalidKmerSize(k));
        }
        Ok(Self {
            k,
            words: vec![0u64; words_for_kmer_size(k)],
        })
    }

    /// Construct directly from a pre-packed word array. Used by the
    /// binary file reader, which reads the words verbatim off disk.
    pub fn from_words(k: usize, words: Vec<u64>) -> Result<Self> {
        if !(MIN_KMER_SIZE..=MAX_KMER_SIZE).contains(&k) {
            return Err(GraphError::InvalidKmerSize(k));
        }
        if words.len() != words_for_kmer_size(k) {
            return Err(GraphError::InvalidKmer(format!(
                "expected {} words for k={}, got {}",
                words_for_kmer_size(k),
                k,
                words.len()
            )));
        }
        Ok(Self { k, words })
    }

    /// Parse a DNA string of exactly `k` bases from `{A,C,G,T}`
    /// (case-insensitive).
    pub fn from_str(s: &str, k: usize) -> Result<Self> {
        if !(MIN_KMER_SIZE..=MAX_KMER_SIZE).contains(&k) {
            return Err(GraphError::InvalidKmerSize(k));
        }
        let bytes = s.as_bytes();
        if bytes.len() != k {
            return Err(GraphError::InvalidKmer(format!(
                "expected {} bases, got {}",
                k,
                bytes.len()
            )));
        }
        let mut bk = Self::zero(k)?;
        for (i, &b) in bytes.iter().enumerate() {
            let code = base_to_code(b)
                .ok_or_else(|| GraphError::InvalidKmer(format!("invalid base {:?}", b as char)))?;
            bk.set_base(i, code);
        }
        Ok(bk)
    }

    /// Render back to an ASCII DNA string.
    pub fn to_string_lossy(&self) -> String {
        (0..self.k).map(|i| code_to_base(self.get_base(i)) as char).collect()
    }

    /// 2-bit code (0..=3) of the base at position `i` (0-indexed from
    /// the 5' end).
    #[inline]
    pub fn get_base(&self, i: usize) -> u8 {
        debug_assert!(i < self.k);
        let bit_offset = (self.k - 1 - i) * BITS_PER_BASE;
        let word_idx = self.words.len() - 1 - bit_offset / 64;
        let shift = bit_offset % 64;
        ((self.words[word_idx] >> shift) & 0x3) as u8
    }

    /// Overwrite the base at position `i` with a 2-bit code.
    #[inline]
    pub fn set_base(&mut self, i: usize, code: u8) {
        debug_assert!(i < self.k);
        let bit_offset = (self.k - 1 - i) * BITS_PER_BASE;
        let word_idx = self.words.len() - 1 - bit_offset / 64;
        let shift = bit_offset % 64;
        let word = &mut self.words[word_idx];
        *word &= !(0x3u64 << shift);
        *word |= (u64::from(code) & 0x3) << shift;
    }

    /// Reverse complement: reverse base order and complement each base.
    pub fn reverse_complement(&self) -> Self {
        let mut out = Self::zero(self.k).unwrap();
        for i in 0..self.k {
            let c = complement_code(self.get_base(i));
            out.set_base(self.k - 1 - i, c);
        }
        out
    }

    /// Canonical form: `min(self, reverse_complement(self))` under
    /// unsigned lexicographic order on the word array. Ties (the kmer
    /// is a palindrome) resolve to `self` — the caller is responsible
    /// for tracking that this corresponds to `FORWARD` orientation.
    pub fn canonical(&self) -> Self {
        let rc = self.reverse_complement();
        if self.words <= rc.words {
            self.clone()
        } else {
            rc
        }
    }

    /// Whether `self` is already in canonical form.
    pub fn is_canonical(&self) -> bool {
        let rc = self.reverse_complement();
        self.words <= rc.words
    }

    /// Slide the window forward by one base: drop the first base, push
    /// `base` on as the new last base. `base` is a 2-bit code.
    pub fn shift_add(&self, base: u8) -> Self {
        let mut out = Self::zero(self.k).unwrap();
        for i in 1..self.k {
            out.set_base(i - 1, self.get_base(i));
        }
        out.set_base(self.k - 1, base & 0x3);
        out
    }

    /// Slide the window backward by one base: drop the last base,
    /// push `base` on as the new first base.
    pub fn prepend(&self, base: u8) -> Self {
        let mut out = Self::zero(self.k).unwrap();
        out.set_base(0, base & 0x3);
        for i in 0..self.k - 1 {
            out.set_base(i + 1, self.get_base(i));
        }
        out
    }

    /// Endian-neutral 64-bit hash over the packed word array. Stable
    /// across runs and platforms since it only depends on the logical
    /// base values, not host byte order.
    pub fn hash64(&self) -> u64 {
        // FxHash-style multiplicative mixing (the constant is the
        // golden-ratio-derived constant `rustc-hash` uses), applied
        // word-by-word so the result is independent of in-memory
        // representation.
        const SEED: u64 = 0x51_7c_c1_b7_27_22_0a_95;
        let mut hash = self.k as u64;
        for &w in &self.words {
            hash = (hash.rotate_left(5) ^ w).wrapping_mul(SEED);
        }
        hash
    }
}

impl fmt::Display for BinaryKmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_to_string() {
        for s in ["ACG", "TTTT", "ACGTACGTACGTACGTACG", "GATTACA"] {
            let k = s.len();
            let bk = BinaryKmer::from_str(s, k).unwrap();
            assert_eq!(bk.to_string_lossy(), s);
        }
    }

    #[test]
    fn reverse_complement_involution() {
        let bk = BinaryKmer::from_str("ACGTACG", 7).unwrap();
        let rc = bk.reverse_complement();
        assert_eq!(rc.to_string_lossy(), "CGTACGT");
        assert_eq!(rc.reverse_complement(), bk);
    }

    #[test]
    fn canonical_of_reverse_complement_matches() {
        let bk = BinaryKmer::from_str("ACGTACG", 7).unwrap();
        let rc = bk.reverse_complement();
        assert_eq!(bk.canonical(), rc.canonical());
    }

    #[test]
    fn canonical_picks_lexicographically_smaller() {
        let bk = BinaryKmer::from_str("ACG", 3).unwrap(); // rc = CGT
        let canon = bk.canonical();
        assert_eq!(canon.to_string_lossy(), "ACG");

        let bk2 = BinaryKmer::from_str("CGT", 3).unwrap();
        let canon2 = bk2.canonical();
        assert_eq!(canon2.to_string_lossy(), "ACG");
    }

    #[test]
    fn palindrome_is_its_own_canonical_form() {
        // ACGT reverse-complements to ACGT.
        let bk = BinaryKmer::from_str("ACGT", 4).unwrap();
        assert_eq!(bk.reverse_complement(), bk);
        assert!(bk.is_canonical());
        assert_eq!(bk.canonical(), bk);
    }

    #[test]
    fn shift_add_slides_window_forward() {
        let bk = BinaryKmer::from_str("ACGT", 4).unwrap();
        let next = bk.shift_add(base_code('A'));
        assert_eq!(next.to_string_lossy(), "CGTA");
    }

    #[test]
    fn prepend_slides_window_backward() {
        let bk = BinaryKmer::from_str("ACGT", 4).unwrap();
        let prev = bk.prepend(base_code('T'));
        assert_eq!(prev.to_string_lossy(), "TACG");
    }

    #[test]
    fn hash_is_stable_and_distinguishes_different_kmers() {
        let a = BinaryKmer::from_str("ACGTACG", 7).unwrap();
        let b = BinaryKmer::from_str("ACGTACG", 7).unwrap();
        let c = BinaryKmer::from_str("TTTTTTT", 7).unwrap();
        assert_eq!(a.hash64(), b.hash64());
        assert_ne!(a.hash64(), c.hash64());
    }

    #[test]
    fn rejects_invalid_size_and_bases() {
        assert!(BinaryKmer::from_str("AC", 2).is_err());
        assert!(BinaryKmer::from_str("ACN", 3).is_err());
        assert!(BinaryKmer::from_str("ACGA", 3).is_err());
    }

    #[test]
    fn spans_multiple_words() {
        // k=40 needs 80 bits => 2 words.
        let s = "ACGTACGTACGTACGTACGTACGTACGTACGTACGTACGT";
        let s = &s[..40];
        let bk = BinaryKmer::from_str(s, 40).unwrap();
        assert_eq!(bk.words().len(), 2);
        assert_eq!(bk.to_string_lossy(), s);
    }

    fn base_code(c: char) -> u8 {
        base_to_code(c as u8).unwrap()
    }
}
