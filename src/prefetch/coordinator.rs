//! The prefetch scheduler.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::job::{JobState, PrefetchJob};
use super::stats::{PrefetchStats, PrefetchStatsSnapshot};
use super::PrefetchSettings;
use crate::cache::{CacheKey, CacheStore};
use crate::model::{BoardSnapshot, ServiceRef};
use crate::provider::{AsyncHttpClient, Providers};

/// Schedules background detail fetches for services surfaced on a board.
///
/// Jobs are deduplicated by fingerprint (at most one in flight per service
/// across the process), admitted through a semaphore sized by the
/// concurrency cap, and cancelled hard at their deadline. Outcomes never
/// propagate to the request that triggered scheduling; failures only move
/// counters.
pub struct PrefetchCoordinator<H> {
    providers: Arc<Providers<H>>,
    store: Arc<dyn CacheStore>,
    settings: PrefetchSettings,
    detail_ttl: Duration,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    stats: Arc<PrefetchStats>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl<H: AsyncHttpClient + 'static> PrefetchCoordinator<H> {
    pub fn new(
        providers: Arc<Providers<H>>,
        store: Arc<dyn CacheStore>,
        settings: PrefetchSettings,
        detail_ttl: Duration,
    ) -> Self {
        let max_concurrency = settings.max_concurrency.max(1);
        Self {
            providers,
            store,
            settings,
            detail_ttl,
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            stats: Arc::new(PrefetchStats::new()),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Schedule detail prefetch for every linked service on a freshly
    /// fetched board. Returns the number of jobs actually scheduled.
    ///
    /// Services already in flight or already cache-fresh are skipped. The
    /// call never blocks on job execution.
    pub fn on_miss(&self, board: &BoardSnapshot) -> usize {
        if !self.settings.enabled {
            return 0;
        }

        let mut scheduled = 0;
        for service in board.linked_services() {
            if self.schedule(service) {
                scheduled += 1;
            }
        }
        scheduled
    }

    fn schedule(&self, service: ServiceRef) -> bool {
        let fingerprint = service.fingerprint();

        if !self.claim(&fingerprint) {
            debug!(job = %fingerprint, "skip duplicate");
            self.stats.record_deduped();
            return false;
        }

        let key = CacheKey::service_detail(&service);
        if self.store.get(&key).is_some() {
            debug!(job = %fingerprint, "skip fresh");
            self.stats.record_skipped_fresh();
            self.release(&fingerprint);
            return false;
        }

        self.stats.record_scheduled();
        debug!(job = %fingerprint, "queued");

        let providers = Arc::clone(&self.providers);
        let store = Arc::clone(&self.store);
        let semaphore = Arc::clone(&self.semaphore);
        let in_flight = Arc::clone(&self.in_flight);
        let stats = Arc::clone(&self.stats);
        let cancel = self.cancel.clone();
        let timeout = self.settings.job_timeout;
        let ttl = self.detail_ttl;

        self.tracker.spawn(async move {
            let mut job = PrefetchJob::new(fingerprint, timeout);
            run_job(&mut job, &service, providers, store, semaphore, cancel, &stats, ttl).await;
            let mut in_flight = in_flight.lock().unwrap();
            in_flight.remove(&job.fingerprint);
        });
        true
    }

    fn claim(&self, fingerprint: &str) -> bool {
        let mut in_flight = self.in_flight.lock().unwrap();
        in_flight.insert(fingerprint.to_string())
    }

    fn release(&self, fingerprint: &str) {
        let mut in_flight = self.in_flight.lock().unwrap();
        in_flight.remove(fingerprint);
    }

    pub fn stats(&self) -> PrefetchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of fingerprints currently claimed (queued or running).
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    /// Cancel outstanding jobs and wait for them to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_job<H: AsyncHttpClient>(
    job: &mut PrefetchJob,
    service: &ServiceRef,
    providers: Arc<Providers<H>>,
    store: Arc<dyn CacheStore>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    stats: &PrefetchStats,
    ttl: Duration,
) {
    let _permit = tokio::select! {
        _ = cancel.cancelled() => {
            debug!(job = %job.fingerprint, "cancelled before start");
            job.finish(JobState::Failed);
            stats.record_failed();
            return;
        }
        permit = semaphore.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => {
                job.finish(JobState::Failed);
                stats.record_failed();
                return;
            }
        },
    };

    job.start();
    debug!(job = %job.fingerprint, "start");

    let result = tokio::select! {
        _ = cancel.cancelled() => {
            debug!(job = %job.fingerprint, "cancelled");
            job.finish(JobState::Failed);
            stats.record_failed();
            return;
        }
        result = tokio::time::timeout_at(job.deadline, providers.fetch_service_detail(service)) => result,
    };

    match result {
        Err(_elapsed) => {
            // Hard deadline, fixed at enqueue: the outbound call is dropped
            // and nothing is written to the cache.
            warn!(job = %job.fingerprint, "deadline expired");
            job.finish(JobState::TimedOut);
            stats.record_timed_out();
        }
        Ok(Err(err)) => {
            debug!(job = %job.fingerprint, error = %err, "failed");
            job.finish(JobState::Failed);
            stats.record_failed();
        }
        Ok(Ok(detail)) => {
            match serde_json::to_vec(&detail) {
                Ok(bytes) => {
                    let key = CacheKey::service_detail(service);
                    if let Err(err) = store.set(&key, bytes, ttl) {
                        warn!(job = %job.fingerprint, error = %err, "cache write failed");
                    }
                    debug!(job = %job.fingerprint, "done");
                    job.finish(JobState::Succeeded);
                    stats.record_succeeded();
                }
                Err(err) => {
                    warn!(job = %job.fingerprint, error = %err, "serialization failed");
                    job.finish(JobState::Failed);
                    stats.record_failed();
                }
            }
        }
    }
}
