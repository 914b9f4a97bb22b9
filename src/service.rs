//! Request-path facade over cache, providers, and prefetch.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{self, CacheError, CacheKey, CacheStatsSnapshot, CacheStore};
use crate::config::Settings;
use crate::model::{BoardSnapshot, BoardView, LineStatus, ProviderKind, ServiceDetail, ServiceRef};
use crate::prefetch::{PrefetchCoordinator, PrefetchStatsSnapshot};
use crate::provider::{
    AsyncHttpClient, HttpError, ProviderError, Providers, ReqwestClient,
};

/// Errors constructing a [`BoardService`].
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("cache setup failed: {0}")]
    Cache(#[from] CacheError),
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] HttpError),
}

/// Cache-first access to boards, service details, and line status.
///
/// Every read follows the same shape: serve from the cache when fresh,
/// otherwise fetch live, write the result back best-effort, and return it.
/// A board miss additionally hands the fetched board to the prefetch
/// coordinator; a board hit never does.
pub struct BoardService<H> {
    providers: Arc<Providers<H>>,
    store: Arc<dyn CacheStore>,
    prefetch: PrefetchCoordinator<H>,
    board_ttl: Duration,
    detail_ttl: Duration,
}

impl BoardService<ReqwestClient> {
    /// Wire up the full stack from configuration.
    pub fn from_settings(settings: &Settings) -> Result<Self, SetupError> {
        let http = ReqwestClient::with_timeout(settings.http_timeout)?;
        let providers = Arc::new(Providers::new(
            http,
            settings.rail.clone(),
            settings.tfl.clone(),
        ));
        let store = cache::build_store(&settings.cache)?;
        Ok(Self::new(
            providers,
            store,
            settings.cache.board_ttl,
            settings.cache.detail_ttl,
            settings.prefetch.clone(),
        ))
    }
}

impl<H: AsyncHttpClient + 'static> BoardService<H> {
    pub fn new(
        providers: Arc<Providers<H>>,
        store: Arc<dyn CacheStore>,
        board_ttl: Duration,
        detail_ttl: Duration,
        prefetch_settings: crate::prefetch::PrefetchSettings,
    ) -> Self {
        let prefetch = PrefetchCoordinator::new(
            Arc::clone(&providers),
            Arc::clone(&store),
            prefetch_settings,
            detail_ttl,
        );
        Self {
            providers,
            store,
            prefetch,
            board_ttl,
            detail_ttl,
        }
    }

    /// Decode a cached entry, dropping entries that no longer parse so the
    /// caller falls through to a live fetch.
    fn cached<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let bytes = self.store.get(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = %key, error = %err, "dropping undecodable cache entry");
                if let Err(err) = self.store.delete(key) {
                    warn!(key = %key, error = %err, "cache delete failed");
                }
                None
            }
        }
    }

    /// Best-effort write; a failing cache never fails the request.
    fn store_entry<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key = %key, error = %err, "cache serialization failed");
                return;
            }
        };
        if let Err(err) = self.store.set(key, bytes, ttl) {
            warn!(key = %key, error = %err, "cache write failed");
        }
    }

    /// Fetch a board, serving from cache when fresh.
    ///
    /// On a miss the live result is cached under the board TTL and the
    /// board's linked services are handed to the prefetch coordinator.
    pub async fn get_board(
        &self,
        provider: ProviderKind,
        station_id: &str,
        view: BoardView,
    ) -> Result<BoardSnapshot, ProviderError> {
        let key = CacheKey::board(provider, station_id, view);
        if let Some(board) = self.cached::<BoardSnapshot>(&key) {
            debug!(key = %key, "board cache hit");
            return Ok(board);
        }

        let board = self.providers.fetch_board(provider, station_id, view).await?;
        self.store_entry(&key, &board, self.board_ttl);

        let scheduled = self.prefetch.on_miss(&board);
        debug!(key = %key, scheduled, "board cache miss served live");
        Ok(board)
    }

    /// Fetch an assembled service detail, serving from cache when fresh.
    ///
    /// Details use their own TTL; a record warmed by a prefetch job is a
    /// hit here.
    pub async fn get_service_detail(
        &self,
        service: &ServiceRef,
    ) -> Result<ServiceDetail, ProviderError> {
        let key = CacheKey::service_detail(service);
        if let Some(detail) = self.cached::<ServiceDetail>(&key) {
            debug!(key = %key, "detail cache hit");
            return Ok(detail);
        }

        let detail = self.providers.fetch_service_detail(service).await?;
        self.store_entry(&key, &detail, self.detail_ttl);
        Ok(detail)
    }

    /// Fetch line status for one line or the provider's default scope.
    pub async fn get_line_status(
        &self,
        provider: ProviderKind,
        line_id: Option<&str>,
    ) -> Result<Vec<LineStatus>, ProviderError> {
        let scope = self.providers.line_status_scope(provider, line_id);
        let key = CacheKey::line_status(provider, &scope);
        if let Some(statuses) = self.cached::<Vec<LineStatus>>(&key) {
            debug!(key = %key, "status cache hit");
            return Ok(statuses);
        }

        let statuses = self.providers.fetch_line_status(provider, line_id).await?;
        self.store_entry(&key, &statuses, self.board_ttl);
        Ok(statuses)
    }

    /// Operator-facing invalidation of a single entry.
    pub fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.store.delete(key)
    }

    /// Operator-facing invalidation of the whole cache.
    pub fn clear_cache(&self) -> Result<(), CacheError> {
        self.store.clear()
    }

    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.store.stats()
    }

    pub fn prefetch_stats(&self) -> PrefetchStatsSnapshot {
        self.prefetch.stats()
    }

    /// Cancel outstanding prefetch jobs and wait for them to finish.
    pub async fn shutdown(&self) {
        self.prefetch.shutdown().await;
    }
}
