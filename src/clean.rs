//! Graph cleaning: coverage-threshold estimation and the two-pass
//! mark-and-prune cycle that removes low-coverage supernodes and tips.
//!
//! The kmer coverage-threshold estimator fits a gamma distribution to
//! the low end of the coverage histogram (errors are assumed to
//! dominate there) and picks the smallest coverage at which the
//! false-discovery rate for "this kmer is real" drops below a limit,
//! widening the limit by a factor of ten until one is found. The
//! supernode threshold estimator instead looks for where the
//! histogram's first- and second-difference ratios cross 1, falling
//! back to half the mean sequencing depth when the histogram is too
//! short or the crossing never occurs. Translated from Gil McVean's
//! method as implemented in the original C cleaning pass; variable
//! names below follow that derivation rather than inventing new ones.

use crate::bitset::AtomicBitset;
use crate::graph_store::GraphStore;
use crate::hashtable::KmerHashTable;
use crate::pruner::prune_nodes_lacking_flag;
use crate::supernode::{is_tip, supernodes_iterate};
use crate::{status, warning};
use statrs::function::gamma::{gamma, ln_gamma};
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

pub const COVG_ARRSIZE: usize = 1000;
pub const MEAN_COVG_ARRSIZE: usize = 1000;
pub const LEN_ARRSIZE: usize = 1000;

struct AtomicHistogram {
    counts: Vec<AtomicU64>,
}

impl AtomicHistogram {
    fn new(size: usize) -> Self {
        let mut counts = Vec::with_capacity(size);
        counts.resize_with(size, || AtomicU64::new(0));
        Self { counts }
    }

    fn bump(&self, value: usize) {
        let idx = value.min(self.counts.len() - 1);
        self.counts[idx].fetch_add(1, Ordering::Relaxed);
    }

    fn into_vec(self) -> Vec<u64> {
        self.counts.into_iter().map(|a| a.into_inner()).collect()
    }
}

/// Coverage and length histograms gathered over one supernode pass.
#[derive(Debug, Clone)]
pub struct SupernodeHistograms {
    pub covg_hist: Vec<u64>,
    pub mean_covg_hist: Vec<u64>,
    pub len_hist: Vec<u64>,
}

/// Per-reason tallies of what a mark pass decided to drop.
#[derive(Debug, Clone, Default)]
pub struct CleanCounts {
    pub num_tips: u64,
    pub num_low_covg_snodes: u64,
    pub num_tip_and_low_snodes: u64,
    pub num_tip_kmers: u64,
    pub num_low_covg_snode_kmers: u64,
    pub num_tip_and_low_snode_kmers: u64,
}

/// Outcome of a full clean pass: before/after histograms, removal
/// tallies, and kmer counts.
#[derive(Debug, Clone)]
pub struct CleanReport {
    pub before: SupernodeHistograms,
    pub after: SupernodeHistograms,
    pub counts: CleanCounts,
    pub kmers_before: u64,
    pub kmers_after: u64,
}

fn update_kmer_covg_hist(
    covg_hist: &AtomicHistogram,
    mean_covg_hist: &AtomicHistogram,
    len_hist: &AtomicHistogram,
    covgs: &[u32],
) {
    for &c in covgs {
        covg_hist.bump(c as usize);
    }
    len_hist.bump(covgs.len());
    let sum: u64 = covgs.iter().map(|&c| c as u64).sum();
    let mean = sum / covgs.len() as u64;
    mean_covg_hist.bump(mean as usize);
}

/// Drives supernode enumeration for cleaning: histogram collection,
/// mark-and-prune, and the gamma-model / delta-ratio threshold
/// estimators.
pub struct CleanEngine<'a> {
    table: &'a KmerHashTable,
    store: &'a GraphStore,
}

impl<'a> CleanEngine<'a> {
    pub fn new(table: &'a KmerHashTable, store: &'a GraphStore) -> Self {
        Self { table, store }
    }

    fn collect(&self, nthreads: usize, visited: &AtomicBitset, keep: Option<&AtomicBitset>, covg_threshold: u32, min_keep_tip: usize) -> (SupernodeHistograms, CleanCounts) {
        let covg_hist = AtomicHistogram::new(COVG_ARRSIZE);
        let mean_covg_hist = AtomicHistogram::new(MEAN_COVG_ARRSIZE);
        let len_hist = AtomicHistogram::new(LEN_ARRSIZE);

        let num_tips = AtomicU64::new(0);
        let num_low_covg_snodes = AtomicU64::new(0);
        let num_tip_and_low_snodes = AtomicU64::new(0);
        let num_tip_kmers = AtomicU64::new(0);
        let num_low_covg_snode_kmers = AtomicU64::new(0);
        let num_tip_and_low_snode_kmers = AtomicU64::new(0);

        supernodes_iterate(self.table, self.store, nthreads, visited, |buf, _tid| {
            let covgs: Vec<u32> = buf.nodes.iter().map(|n| self.store.covg_union(n.hkey)).collect();
            if covgs.is_empty() {
                return;
            }

            match keep {
                None => update_kmer_covg_hist(&covg_hist, &mean_covg_hist, &len_hist, &covgs),
                Some(keep) => {
                    let sum: u64 = covgs.iter().map(|&c| c as u64).sum();
                    let mean_covg = sum / covgs.len() as u64;
                    let low_covg = mean_covg < covg_threshold as u64;
                    let removable_tip = buf.len() < min_keep_tip && is_tip(self.store, buf);
                    let len = buf.len() as u64;

                    if low_covg && removable_tip {
                        num_tip_and_low_snodes.fetch_add(1, Ordering::Relaxed);
                        num_tip_and_low_snode_kmers.fetch_add(len, Ordering::Relaxed);
                    } else if low_covg {
                        num_low_covg_snodes.fetch_add(1, Ordering::Relaxed);
                        num_low_covg_snode_kmers.fetch_add(len, Ordering::Relaxed);
                    } else if removable_tip {
                        num_tips.fetch_add(1, Ordering::Relaxed);
                        num_tip_kmers.fetch_add(len, Ordering::Relaxed);
                    } else {
                        for n in &buf.nodes {
                            keep.set(n.hkey.0);
                        }
                        update_kmer_covg_hist(&covg_hist, &mean_covg_hist, &len_hist, &covgs);
                    }
                }
            }
        });

        let hist = SupernodeHistograms {
            covg_hist: covg_hist.into_vec(),
            mean_covg_hist: mean_covg_hist.into_vec(),
            len_hist: len_hist.into_vec(),
        };
        let counts = CleanCounts {
            num_tips: num_tips.load(Ordering::Relaxed),
            num_low_covg_snodes: num_low_covg_snodes.load(Ordering::Relaxed),
            num_tip_and_low_snodes: num_tip_and_low_snodes.load(Ordering::Relaxed),
            num_tip_kmers: num_tip_kmers.load(Ordering::Relaxed),
            num_low_covg_snode_kmers: num_low_covg_snode_kmers.load(Ordering::Relaxed),
            num_tip_and_low_snode_kmers: num_tip_and_low_snode_kmers.load(Ordering::Relaxed),
        };
        (hist, counts)
    }

    /// Gather before-cleaning coverage/length histograms without
    /// modifying the graph. `visited` is left set; clear it before
    /// reuse.
    pub fn supernode_histograms(&self, nthreads: usize, visited: &AtomicBitset) -> SupernodeHistograms {
        self.collect(nthreads, visited, None, 0, 0).0
    }

    /// Run a full clean: mark supernodes to keep, prune the rest, and
    /// report what happened. Returns `None` if the table is empty or
    /// both thresholds are zero (nothing to do).
    pub fn clean(
        &self,
        nthreads: usize,
        covg_threshold: u32,
        min_keep_tip: usize,
        visited: &AtomicBitset,
        keep: &AtomicBitset,
    ) -> Option<CleanReport> {
        let kmers_before = self.table.count_kmers();
        if kmers_before == 0 {
            return None;
        }
        if covg_threshold == 0 && min_keep_tip == 0 {
            warning!("no cleaning specified");
            return None;
        }

        status!("removing supernodes with coverage < {} and tips shorter than {}", covg_threshold, min_keep_tip);

        let before = self.supernode_histograms(nthreads, visited);
        visited.clear_all();

        let (after, counts) = self.collect(nthreads, visited, Some(keep), covg_threshold, min_keep_tip);
        visited.clear_all();

        prune_nodes_lacking_flag(self.table, self.store, nthreads, keep);
        keep.clear_all();

        let kmers_after = self.table.count_kmers();
        status!(
            "remaining kmers: {} removed: {} ({:.1}%)",
            kmers_after,
            kmers_before - kmers_after,
            100.0 * (kmers_before - kmers_after) as f64 / kmers_before as f64
        );

        Some(CleanReport { before, after, counts, kmers_before, kmers_after })
    }
}

/// Fit a gamma distribution to the low end of `kmer_covg` (a histogram
/// indexed by coverage, `kmer_covg[0]` must be zero, length at least
/// 10) and return the smallest coverage whose estimated false-discovery
/// rate drops below `fdr_limit`, along with the fitted (alpha, beta).
/// Returns `None` for the threshold if no coverage satisfies the limit.
pub fn pick_kmer_threshold(kmer_covg: &[u64], fdr_limit: f64) -> (Option<usize>, f64, f64) {
    assert!(kmer_covg.len() >= 10);
    assert!(fdr_limit > 0.0 && fdr_limit < 1.0);

    let r1 = kmer_covg[2] as f64 / kmer_covg[1] as f64;
    let r2 = kmer_covg[3] as f64 / kmer_covg[2] as f64;
    let rr = r2 / r1;

    let mut best_idx = 0usize;
    let mut best_diff = f64::MAX;
    for i in 1..=200usize {
        let aa = i as f64 * 0.01;
        let faa = gamma(aa) * gamma(aa + 2.0) / (2.0 * gamma(aa + 1.0).powi(2));
        let diff = (faa - rr).abs();
        if diff < best_diff {
            best_diff = diff;
            best_idx = i;
        }
    }

    let a_est = best_idx as f64 * 0.01;
    let b_est = (gamma(a_est + 1.0) / (r1 * gamma(a_est)) - 1.0).max(1e-6);
    let c0 = kmer_covg[1] as f64 * (b_est / (1.0 + b_est)).powf(-a_est);

    let log_b_est = b_est.ln();
    let log_one_plus_b_est = (1.0 + b_est).ln();
    let lgamma_a_est = ln_gamma(a_est);

    // i = 0, 1 are treated as known noise and skipped: lgamma(a_est + i - 1)
    // sits right at its pole there, which the source leaves unguarded.
    let mut threshold = None;
    for i in 2..kmer_covg.len() {
        let e_cov = a_est * log_b_est - lgamma_a_est - ln_gamma(i as f64) + ln_gamma(a_est + i as f64 - 1.0)
            - (a_est + i as f64 - 1.0) * log_one_plus_b_est;
        let e_cov_c0 = e_cov.exp() * c0;
        let fdr = 1.0 - (kmer_covg[i] as f64 - e_cov_c0) / kmer_covg[i] as f64;
        if fdr < fdr_limit {
            threshold = Some(i);
            break;
        }
    }
    (threshold, a_est, b_est)
}

/// Repeatedly widen the false-discovery-rate limit by a factor of ten,
/// starting at 0.001, until [`pick_kmer_threshold`] finds a coverage
/// cutoff or the limit reaches 1. Returns the threshold (if any), the
/// fitted (alpha, beta), and the limit that worked.
pub fn estimate_kmer_threshold(kmer_covg: &[u64]) -> (Option<usize>, f64, f64, f64) {
    let mut fdr_limit = 0.001;
    let mut result = (None, 0.0, 0.0);
    while fdr_limit < 1.0 {
        result = pick_kmer_threshold(kmer_covg, fdr_limit);
        if result.0.is_some() {
            break;
        }
        fdr_limit *= 10.0;
    }
    (result.0, result.1, result.2, fdr_limit)
}

/// Pick a supernode coverage threshold from a histogram of supernode
/// coverages, using the first- and second-difference crossing method
/// with a sequencing-depth fallback. `seq_depth`, if `<= 0`, is
/// estimated as `total_covg_sum / num_kmers`.
pub fn pick_supernode_threshold(covgs: &[u64], seq_depth: f64, total_covg_sum: u64, num_kmers: u64) -> usize {
    assert!(covgs.len() > 5);
    assert!(num_kmers > 0);

    let seq_depth_est = total_covg_sum as f64 / num_kmers as f64;
    let seq_depth = if seq_depth > 0.0 { seq_depth } else { seq_depth_est };
    let fallback_thresh = (((seq_depth + 1.0) / 2.0).max(1.0)) as usize;

    let d1len_cap = covgs.len() - 2;
    let delta1: Vec<f64> = (0..d1len_cap)
        .map(|i| (covgs[i + 1] as f64 + 1.0) / (covgs[i + 2] as f64 + 1.0))
        .collect();
    let d1len = delta1.len();
    if d1len <= 2 {
        return fallback_thresh;
    }

    let d2len = d1len - 1;
    let delta2: Vec<f64> = (0..d2len).map(|i| delta1[i] / delta1[i + 1]).collect();

    let mut f1 = 0usize;
    while f1 < d1len && delta1[f1] >= 1.0 {
        f1 += 1;
    }
    let mut f2 = 0usize;
    while f2 < d2len && delta2[f2] > 1.0 {
        f2 += 1;
    }

    if f1 < d1len && (f1 as f64) < seq_depth * 0.75 {
        f1 + 1
    } else if f2 < d2len {
        f2 + 1
    } else {
        fallback_thresh + 1
    }
}

/// Write the `Covg,NumKmers,NumSupernodeMeanCovg` CSV, dropping
/// trailing all-zero rows.
pub fn write_covg_histogram<W: Write>(w: &mut W, covg_hist: &[u64], mean_covg_hist: &[u64]) -> io::Result<()> {
    assert!(covg_hist.len() >= 2 && covg_hist[0] == 0);
    writeln!(w, "Covg,NumKmers,NumSupernodeMeanCovg")?;
    let mut end = covg_hist.len() - 1;
    while end > 2 && covg_hist[end] == 0 {
        end -= 1;
    }
    let mut buf = itoa::Buffer::new();
    for i in 1..=end {
        if covg_hist[i] > 0 {
            w.write_all(buf.format(i).as_bytes())?;
            w.write_all(b",")?;
            w.write_all(buf.format(covg_hist[i]).as_bytes())?;
            w.write_all(b",")?;
            w.write_all(buf.format(mean_covg_hist[i]).as_bytes())?;
            w.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// Write the `SupernodeKmerLength,bp,Count` CSV, dropping trailing
/// all-zero rows.
pub fn write_len_histogram<W: Write>(w: &mut W, len_hist: &[u64], kmer_size: usize) -> io::Result<()> {
    assert!(len_hist.len() >= 2 && len_hist[0] == 0);
    writeln!(w, "SupernodeKmerLength,bp,Count")?;
    let mut end = len_hist.len() - 1;
    while end > 1 && len_hist[end] == 0 {
        end -= 1;
    }
    let mut buf = itoa::Buffer::new();
    w.write_all(b"1,")?;
    w.write_all(buf.format(kmer_size).as_bytes())?;
    w.write_all(b",")?;
    w.write_all(buf.format(len_hist[1]).as_bytes())?;
    w.write_all(b"\n")?;
    for i in 2..=end {
        if len_hist[i] > 0 {
            w.write_all(buf.format(i).as_bytes())?;
            w.write_all(b",")?;
            w.write_all(buf.format(kmer_size + i - 1).as_bytes())?;
            w.write_all(b",")?;
            w.write_all(buf.format(len_hist[i]).as_bytes())?;
            w.write_all(b"\n")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_store::Direction;
    use crate::kmer::BinaryKmer;

    #[test]
    fn pick_kmer_threshold_finds_a_cutoff_on_synthetic_gamma_tail() {
        // A histogram shaped like an error tail (roughly geometric
        // decay) should yield some finite cutoff at a loose FDR.
        let hist: Vec<u64> = vec![0, 1000, 400, 160, 64, 26, 10, 4, 2, 1];
        let (threshold, alpha, beta) = pick_kmer_threshold(&hist, 0.5);
        assert!(threshold.is_some());
        assert!(alpha > 0.0);
        assert!(beta > 0.0);
    }

    #[test]
    fn estimate_kmer_threshold_widens_fdr_until_found() {
        let hist: Vec<u64> = vec![0, 1000, 400, 160, 64, 26, 10, 4, 2, 1];
        let (threshold, _, _, fdr) = estimate_kmer_threshold(&hist);
        assert!(threshold.is_some());
        assert!(fdr >= 0.001);
    }

    #[test]
    fn pick_supernode_threshold_falls_back_on_short_histogram() {
        let covgs = vec![0u64, 5, 3, 0, 0, 0, 0];
        let t = pick_supernode_threshold(&covgs, 10.0, 1000, 100);
        assert!(t >= 1);
    }

    #[test]
    fn write_histograms_drop_trailing_zero_rows() {
        let covg_hist = vec![0u64, 5, 3, 0, 0];
        let mean_covg_hist = vec![0u64, 2, 1, 0, 0];
        let mut out = Vec::new();
        write_covg_histogram(&mut out, &covg_hist, &mean_covg_hist).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Covg,NumKmers,NumSupernodeMeanCovg\n1,5,2\n2,3,1\n");

        let len_hist = vec![0u64, 4, 2, 0, 0];
        let mut out2 = Vec::new();
        write_len_histogram(&mut out2, &len_hist, 21).unwrap();
        let text2 = String::from_utf8(out2).unwrap();
        assert_eq!(text2, "SupernodeKmerLength,bp,Count\n1,21,4\n2,22,2\n");
    }

    #[test]
    fn clean_removes_low_coverage_tip() {
        let table = KmerHashTable::new(3, 64);
        let store = GraphStore::new(table.capacity(), 1);

        let a = BinaryKmer::from_str("AAA", 3).unwrap();
        let b = BinaryKmer::from_str("AAC", 3).unwrap();
        let mut inserted = false;
        let ha = table.find_or_insert(&a, &mut inserted).unwrap();
        let hb = table.find_or_insert(&b, &mut inserted).unwrap();
        store.add_edge(ha, 0, Direction::Outgoing, 1);
        store.add_edge(hb, 0, Direction::Incoming, 0);
        store.covg_add(ha, 0, 1);
        store.covg_add(hb, 0, 1);

        let engine = CleanEngine::new(&table, &store);
        let visited = AtomicBitset::new(table.capacity());
        let keep = AtomicBitset::new(table.capacity());
        let report = engine.clean(1, 5, 0, &visited, &keep).unwrap();

        assert_eq!(report.kmers_after, 0);
        assert!(report.counts.num_low_covg_snodes >= 1 || report.counts.num_tip_and_low_snodes >= 1);
    }
}
