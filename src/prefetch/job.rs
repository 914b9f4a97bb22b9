//! Prefetch job lifecycle.

use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle of one background fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Admitted, waiting for a worker-pool permit.
    Queued,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::TimedOut
        )
    }
}

/// One background fetch for a single service fingerprint.
///
/// Owned exclusively by the coordinator; request handlers never see jobs.
/// The fingerprint is the dedupe key: at most one non-terminal job per
/// fingerprint exists at a time. The deadline is fixed at enqueue, so time
/// spent waiting for a worker permit counts against it.
#[derive(Debug)]
pub struct PrefetchJob {
    pub fingerprint: String,
    pub deadline: Instant,
    pub state: JobState,
}

impl PrefetchJob {
    pub fn new(fingerprint: String, timeout: Duration) -> Self {
        Self {
            fingerprint,
            deadline: Instant::now() + timeout,
            state: JobState::Queued,
        }
    }

    pub fn start(&mut self) {
        debug_assert_eq!(self.state, JobState::Queued);
        self.state = JobState::Running;
    }

    pub fn finish(&mut self, state: JobState) {
        debug_assert!(state.is_terminal());
        self.state = state;
    }
}
