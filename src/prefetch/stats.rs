//! Prefetch scheduling and outcome counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters covering a coordinator's whole lifetime.
///
/// Scheduling counters (`scheduled`, `deduped`, `skipped_fresh`) are bumped
/// synchronously inside `on_miss`; outcome counters are bumped by the jobs
/// themselves. `scheduled` therefore always ends up equal to the sum of the
/// outcome counters once the coordinator is idle.
#[derive(Debug, Default)]
pub struct PrefetchStats {
    scheduled: AtomicU64,
    deduped: AtomicU64,
    skipped_fresh: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

impl PrefetchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_scheduled(&self) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deduped(&self) {
        self.deduped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_fresh(&self) {
        self.skipped_fresh.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PrefetchStatsSnapshot {
        PrefetchStatsSnapshot {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            deduped: self.deduped.load(Ordering::Relaxed),
            skipped_fresh: self.skipped_fresh.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`PrefetchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchStatsSnapshot {
    pub scheduled: u64,
    pub deduped: u64,
    pub skipped_fresh: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
}

impl PrefetchStatsSnapshot {
    /// Jobs that have reached a terminal state.
    pub fn terminal(&self) -> u64 {
        self.succeeded + self.failed + self.timed_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = PrefetchStats::new();
        stats.record_scheduled();
        stats.record_scheduled();
        stats.record_deduped();
        stats.record_skipped_fresh();
        stats.record_succeeded();
        stats.record_failed();
        stats.record_timed_out();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.scheduled, 2);
        assert_eq!(snapshot.deduped, 1);
        assert_eq!(snapshot.skipped_fresh, 1);
        assert_eq!(snapshot.terminal(), 3);
    }
}
