//! Bookkeeping for graph/sequence loading: counts of reads and kmers
//! seen across one or more input files.
//!
//! Plain [`LoadingStats`] is the value callers accumulate results into
//! after a load finishes; [`AtomicLoadingStats`] is the concurrent
//! variant a multi-threaded loader updates in place, one
//! `fetch_add` per field, collapsed into a [`LoadingStats`] snapshot
//! once the load completes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Field-wise-additive counters describing one loading pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingStats {
    pub num_se_reads: u64,
    pub num_pe_reads: u64,
    pub num_good_reads: u64,
    pub num_bad_reads: u64,
    pub num_dup_se_reads: u64,
    pub num_dup_pe_pairs: u64,
    pub total_bases_read: u64,
    pub total_bases_loaded: u64,
    pub contigs_parsed: u64,
    pub num_kmers_parsed: u64,
    pub num_kmers_loaded: u64,
    pub num_kmers_novel: u64,
}

impl LoadingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `other`'s counters into `self`, field by field.
    pub fn merge(&mut self, other: &LoadingStats) {
        self.num_se_reads += other.num_se_reads;
        self.num_pe_reads += other.num_pe_reads;
        self.num_good_reads += other.num_good_reads;
        self.num_bad_reads += other.num_bad_reads;
        self.num_dup_se_reads += other.num_dup_se_reads;
        self.num_dup_pe_pairs += other.num_dup_pe_pairs;
        self.total_bases_read += other.total_bases_read;
        self.total_bases_loaded += other.total_bases_loaded;
        self.contigs_parsed += other.contigs_parsed;
        self.num_kmers_parsed += other.num_kmers_parsed;
        self.num_kmers_loaded += other.num_kmers_loaded;
        self.num_kmers_novel += other.num_kmers_novel;
    }

    /// Log a one-line summary, given the hash table's total kmer count
    /// after loading.
    pub fn print_summary(&self, ht_num_kmers: u64) {
        crate::status!(
            "read {} se / {} pe reads ({} good, {} bad), loaded {} kmers ({} novel), table now holds {} kmers",
            self.num_se_reads,
            self.num_pe_reads,
            self.num_good_reads,
            self.num_bad_reads,
            self.num_kmers_loaded,
            self.num_kmers_novel,
            ht_num_kmers,
        );
    }
}

/// Concurrent accumulator with the same fields as [`LoadingStats`],
/// each an independent `AtomicU64` so parallel loader workers never
/// contend on a shared lock.
#[derive(Debug, Default)]
pub struct AtomicLoadingStats {
    num_se_reads: AtomicU64,
    num_pe_reads: AtomicU64,
    num_good_reads: AtomicU64,
    num_bad_reads: AtomicU64,
    num_dup_se_reads: AtomicU64,
    num_dup_pe_pairs: AtomicU64,
    total_bases_read: AtomicU64,
    total_bases_loaded: AtomicU64,
    contigs_parsed: AtomicU64,
    num_kmers_parsed: AtomicU64,
    num_kmers_loaded: AtomicU64,
    num_kmers_novel: AtomicU64,
}

macro_rules! atomic_add_method {
    ($name:ident, $field:ident) => {
        #[inline]
        pub fn $name(&self, n: u64) {
            self.$field.fetch_add(n, Ordering::Relaxed);
        }
    };
}

impl AtomicLoadingStats {
    pub fn new() -> Self {
        Self::default()
    }

    atomic_add_method!(add_se_reads, num_se_reads);
    atomic_add_method!(add_pe_reads, num_pe_reads);
    atomic_add_method!(add_good_reads, num_good_reads);
    atomic_add_method!(add_bad_reads, num_bad_reads);
    atomic_add_method!(add_dup_se_reads, num_dup_se_reads);
    atomic_add_method!(add_dup_pe_pairs, num_dup_pe_pairs);
    atomic_add_method!(add_total_bases_read, total_bases_read);
    atomic_add_method!(add_total_bases_loaded, total_bases_loaded);
    atomic_add_method!(add_contigs_parsed, contigs_parsed);
    atomic_add_method!(add_kmers_parsed, num_kmers_parsed);
    atomic_add_method!(add_kmers_loaded, num_kmers_loaded);
    atomic_add_method!(add_kmers_novel, num_kmers_novel);

    /// Collapse into a plain snapshot.
    pub fn snapshot(&self) -> LoadingStats {
        LoadingStats {
            num_se_reads: self.num_se_reads.load(Ordering::Relaxed),
            num_pe_reads: self.num_pe_reads.load(Ordering::Relaxed),
            num_good_reads: self.num_good_reads.load(Ordering::Relaxed),
            num_bad_reads: self.num_bad_reads.load(Ordering::Relaxed),
            num_dup_se_reads: self.num_dup_se_reads.load(Ordering::Relaxed),
            num_dup_pe_pairs: self.num_dup_pe_pairs.load(Ordering::Relaxed),
            total_bases_read: self.total_bases_read.load(Ordering::Relaxed),
            total_bases_loaded: self.total_bases_loaded.load(Ordering::Relaxed),
            contigs_parsed: self.contigs_parsed.load(Ordering::Relaxed),
            num_kmers_parsed: self.num_kmers_parsed.load(Ordering::Relaxed),
            num_kmers_loaded: self.num_kmers_loaded.load(Ordering::Relaxed),
            num_kmers_novel: self.num_kmers_novel.load(Ordering::Relaxed),
        }
    }
}
