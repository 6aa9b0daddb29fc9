//! Global process-wide configuration.
//!
//! The only process-wide state the engine owns is a single PRNG seed
//! (spec.md §6) and a "boolean coverage" toggle (spec.md §3) that
//! clamps per-increment coverage to 1. Both are set once at startup and
//! read on the hot path, so they live behind atomics rather than being
//! threaded through every call.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

static PRNG_SEED: AtomicU64 = AtomicU64::new(0);
static PRNG_SEED_SET: AtomicBool = AtomicBool::new(false);
static BOOLEAN_COVGS: AtomicBool = AtomicBool::new(false);

/// Initialize the process-wide PRNG seed. Only the first call has any
/// effect; subsequent calls are no-ops so that re-initialization by a
/// library consumer can never silently change behavior mid-run.
pub fn init_prng_seed(seed: u64) {
    if PRNG_SEED_SET
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
    {
        PRNG_SEED.store(seed, Ordering::Release);
    }
}

/// Read the process-wide PRNG seed. Returns `None` if never initialized.
pub fn prng_seed() -> Option<u64> {
    if PRNG_SEED_SET.load(Ordering::Acquire) {
        Some(PRNG_SEED.load(Ordering::Acquire))
    } else {
        None
    }
}

/// Enable or disable "boolean coverage" mode: coverage increments are
/// clamped to at most 1 per update instead of being added in full.
#[inline]
pub fn set_boolean_covgs(enabled: bool) {
    BOOLEAN_COVGS.store(enabled, Ordering::Release);
}

/// Check whether boolean coverage mode is enabled.
#[inline]
pub fn is_boolean_covgs() -> bool {
    BOOLEAN_COVGS.load(Ordering::Acquire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn seed_inits_once() {
        // Reset via a fresh process is not possible here, so only assert
        // the monotonic "first write wins" contract on whatever value is
        // already set by a prior test in this binary.
        init_prng_seed(7);
        let first = prng_seed();
        init_prng_seed(99);
        assert_eq!(prng_seed(), first);
    }

    #[test]
    #[serial]
    fn boolean_covgs_toggle() {
        set_boolean_covgs(false);
        assert!(!is_boolean_covgs());
        set_boolean_covgs(true);
        assert!(is_boolean_covgs());
        set_boolean_covgs(false);
    }
}
