//! Background prefetch of service detail records.
//!
//! When a board fetch misses the cache, the coordinator derives the set of
//! linked services on that board and warms their detail records in the
//! background, bounded by a concurrency cap and deduplicated by service
//! fingerprint. Prefetch is invisible to the request that triggered it.

pub mod coordinator;
pub mod job;
pub mod stats;

pub use coordinator::PrefetchCoordinator;
pub use job::{JobState, PrefetchJob};
pub use stats::{PrefetchStats, PrefetchStatsSnapshot};

use std::time::Duration;

/// Coordinator tuning knobs.
#[derive(Debug, Clone)]
pub struct PrefetchSettings {
    /// Globally disables scheduling when false; `on_miss` becomes a no-op.
    pub enabled: bool,
    /// Size of the bounded worker pool. Excess jobs queue for a permit.
    pub max_concurrency: usize,
    /// Hard deadline per job; on expiry the job is cancelled and nothing
    /// is written to the cache.
    pub job_timeout: Duration,
}

impl Default for PrefetchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrency: 4,
            job_timeout: Duration::from_secs(15),
        }
    }
}

impl PrefetchSettings {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_job_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = PrefetchSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.max_concurrency, 4);
        assert_eq!(settings.job_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_builders() {
        let settings = PrefetchSettings::disabled()
            .with_max_concurrency(2)
            .with_job_timeout(Duration::from_secs(5));
        assert!(!settings.enabled);
        assert_eq!(settings.max_concurrency, 2);
        assert_eq!(settings.job_timeout, Duration::from_secs(5));
    }
}
