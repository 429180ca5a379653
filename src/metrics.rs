use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Global runtime metrics for the harvest run.
///
/// Purpose:
/// - Track request volume and failures
/// - Track throttling and global pause episodes
/// - Track per-ID outcomes (committed / duplicate / failed)
/// - Track child unit enrichment
///
/// Design:
/// - Lock-free (Atomics)
/// - Cheap to update
/// - Safe in async + multithreaded contexts
#[derive(Default)]
pub struct RuntimeMetrics {
    // Network
    pub requests_sent: AtomicUsize,
    pub request_failures: AtomicUsize,

    // Rate limiting
    pub throttle_signals: AtomicUsize,
    pub pause_episodes: AtomicUsize,

    // Per-ID outcomes
    pub retries: AtomicUsize,
    pub records_committed: AtomicUsize,
    pub duplicates_dropped: AtomicUsize,
    pub records_failed: AtomicUsize,

    // Child units
    pub units_enriched: AtomicUsize,
    pub unit_enrichment_failures: AtomicUsize,
}

impl RuntimeMetrics {
    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// One-line snapshot used by the periodic reporter and the final summary.
    pub fn snapshot_line(&self) -> String {
        format!(
            "req={} req_err={} throttled={} pauses={} retries={} committed={} dup={} failed={} units={} unit_err={}",
            self.requests_sent.load(Ordering::Relaxed),
            self.request_failures.load(Ordering::Relaxed),
            self.throttle_signals.load(Ordering::Relaxed),
            self.pause_episodes.load(Ordering::Relaxed),
            self.retries.load(Ordering::Relaxed),
            self.records_committed.load(Ordering::Relaxed),
            self.duplicates_dropped.load(Ordering::Relaxed),
            self.records_failed.load(Ordering::Relaxed),
            self.units_enriched.load(Ordering::Relaxed),
            self.unit_enrichment_failures.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
