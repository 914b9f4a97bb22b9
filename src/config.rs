//! Environment-driven configuration.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::cache::{CacheBackend, CacheSettings};
use crate::prefetch::PrefetchSettings;
use crate::provider::{RailSettings, TflSettings};

/// Complete configuration for a [`crate::service::BoardService`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache: CacheSettings,
    pub prefetch: PrefetchSettings,
    pub rail: RailSettings,
    pub tfl: TflSettings,
    /// Per-request timeout for outbound provider calls.
    pub http_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            prefetch: PrefetchSettings::default(),
            rail: RailSettings::default(),
            tfl: TflSettings::default(),
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl Settings {
    /// Load settings from process environment variables, falling back to
    /// defaults for anything unset. Invalid values are logged and ignored
    /// rather than fatal.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(backend) = get("LIVEBOARD_CACHE_BACKEND") {
            match backend.trim().to_lowercase().as_str() {
                "memory" => settings.cache.backend = CacheBackend::Memory,
                "sqlite" => settings.cache.backend = CacheBackend::Sqlite,
                other => warn!(value = other, "unknown cache backend, using memory"),
            }
        }
        if let Some(secs) = parse_var::<u64>(&get, "LIVEBOARD_CACHE_TTL_SECONDS") {
            settings.cache.board_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&get, "LIVEBOARD_DETAIL_TTL_SECONDS") {
            settings.cache.detail_ttl = Duration::from_secs(secs);
        }
        if let Some(path) = get("LIVEBOARD_CACHE_SQLITE_PATH") {
            settings.cache.sqlite_path = PathBuf::from(path);
        }

        if let Some(enabled) = parse_var::<bool>(&get, "LIVEBOARD_PREFETCH_ENABLED") {
            settings.prefetch.enabled = enabled;
        }
        if let Some(cap) = parse_var::<usize>(&get, "LIVEBOARD_PREFETCH_MAX_CONCURRENCY") {
            settings.prefetch.max_concurrency = cap;
        }
        if let Some(secs) = parse_var::<u64>(&get, "LIVEBOARD_PREFETCH_TIMEOUT_SECONDS") {
            settings.prefetch.job_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&get, "LIVEBOARD_HTTP_TIMEOUT_SECONDS") {
            settings.http_timeout = Duration::from_secs(secs);
        }

        if let Some(base_url) = get("RAIL_API_BASE_URL") {
            settings.rail.base_url = base_url;
        }
        if let Some(api_key) = get("RAIL_API_KEY") {
            settings.rail.api_key = api_key;
        }

        if let Some(base_url) = get("TFL_API_BASE_URL") {
            settings.tfl.base_url = base_url;
        }
        // TFL_API_KEY is accepted as an alias for shell compatibility.
        if let Some(app_key) = get("TFL_APP_KEY").or_else(|| get("TFL_API_KEY")) {
            settings.tfl.app_key = app_key;
        }
        if let Some(app_id) = get("TFL_APP_ID") {
            settings.tfl.app_id = app_id;
        }
        if let Some(modes) = get("TFL_MODES") {
            let modes: Vec<String> = modes
                .split(',')
                .map(|mode| mode.trim().to_lowercase())
                .filter(|mode| !mode.is_empty())
                .collect();
            if !modes.is_empty() {
                settings.tfl.modes = modes;
            }
        }

        settings
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(var = name, value = %raw, error = %err, "ignoring unparseable setting");
            None
        }
    }
}
