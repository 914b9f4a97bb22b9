//! Service detail assembly.
//!
//! A detail record is merged from up to three sources, in priority order:
//! a live prediction, the route sequence (for the stop list), and the
//! static timetable (an ETA fallback when no live prediction matched).
//! Each provider exposes its sources through [`DetailSource`]; sources a
//! provider does not support are never consulted.

use chrono::{DateTime, Utc};
use std::future::Future;
use tracing::{debug, warn};

use crate::model::{DetailTier, ServiceDetail, ServiceRef, ServiceStop};
use crate::provider::ProviderError;

/// The three detail sources, in merge priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Live,
    Route,
    Timetable,
}

/// Live prediction data for one service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LivePrediction {
    pub line_name: Option<String>,
    pub destination_name: Option<String>,
    pub direction: Option<String>,
    pub expected_arrival: Option<DateTime<Utc>>,
    pub eta_minutes: Option<u32>,
    pub vehicle_id: Option<String>,
    pub platform: Option<String>,
}

/// Ordered stop list for the service's route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteSequence {
    pub origin_name: Option<String>,
    pub destination_name: Option<String>,
    pub stops: Vec<ServiceStop>,
}

/// Schedule-derived fallback used when no live prediction matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimetableFallback {
    pub line_name: Option<String>,
    pub eta_minutes: Option<u32>,
}

/// Per-provider access to the detail sources.
///
/// `Ok(None)` means the source answered but had nothing for this service
/// (e.g. no live prediction currently matches). Errors are recorded by the
/// assembler and only surfaced when no source produced anything.
pub trait DetailSource: Send + Sync {
    /// Whether this provider has the given source at all. Unsupported
    /// sources are skipped without an outbound call.
    fn supports(&self, kind: SourceKind) -> bool;

    fn live_prediction(
        &self,
        service: &ServiceRef,
    ) -> impl Future<Output = Result<Option<LivePrediction>, ProviderError>> + Send;

    fn route_sequence(
        &self,
        service: &ServiceRef,
    ) -> impl Future<Output = Result<Option<RouteSequence>, ProviderError>> + Send;

    fn timetable(
        &self,
        service: &ServiceRef,
    ) -> impl Future<Output = Result<Option<TimetableFallback>, ProviderError>> + Send;
}

/// Merge the available sources into a best-effort [`ServiceDetail`].
///
/// The record's tier reflects what was merged: `Live` when a prediction
/// matched and the route supplied stops, `Partial` when a prediction
/// matched but stops are missing, `TimetableOnly` when no prediction
/// matched. An error from one source does not abort assembly; the first
/// error is returned only if every source came back empty.
pub async fn assemble<S: DetailSource>(
    source: &S,
    service: &ServiceRef,
) -> Result<ServiceDetail, ProviderError> {
    let fingerprint = service.fingerprint();
    let mut first_error: Option<ProviderError> = None;

    let live = if source.supports(SourceKind::Live) {
        match source.live_prediction(service).await {
            Ok(live) => live,
            Err(err) => {
                warn!(service = %fingerprint, error = %err, "live prediction source failed");
                first_error.get_or_insert(err);
                None
            }
        }
    } else {
        None
    };

    let route = if source.supports(SourceKind::Route) {
        match source.route_sequence(service).await {
            Ok(route) => route,
            Err(err) => {
                warn!(service = %fingerprint, error = %err, "route sequence source failed");
                first_error.get_or_insert(err);
                None
            }
        }
    } else {
        None
    };

    // The timetable is only an ETA fallback; skip it when live data exists.
    let timetable = if live.is_none() && source.supports(SourceKind::Timetable) {
        match source.timetable(service).await {
            Ok(timetable) => timetable,
            Err(err) => {
                warn!(service = %fingerprint, error = %err, "timetable source failed");
                first_error.get_or_insert(err);
                None
            }
        }
    } else {
        None
    };

    if live.is_none() && route.is_none() && timetable.is_none() {
        return Err(first_error.unwrap_or(ProviderError::NotFound {
            resource: fingerprint,
        }));
    }

    let live_matched = live.is_some();
    let live = live.unwrap_or_default();
    let route = route.unwrap_or_default();
    let timetable = timetable.unwrap_or_default();

    let tier = match (live_matched, route.stops.is_empty()) {
        (true, false) => DetailTier::Live,
        (true, true) => DetailTier::Partial,
        (false, _) => DetailTier::TimetableOnly,
    };
    debug!(service = %fingerprint, ?tier, stops = route.stops.len(), "assembled service detail");

    Ok(ServiceDetail {
        service: service.clone(),
        line_name: live.line_name.or(timetable.line_name),
        origin_name: route.origin_name,
        destination_name: live.destination_name.or(route.destination_name),
        direction: live.direction,
        expected_arrival: live.expected_arrival,
        eta_minutes: live.eta_minutes.or(timetable.eta_minutes),
        vehicle_id: live.vehicle_id,
        platform: live.platform,
        stops: route.stops,
        tier,
        pulled_at: Utc::now(),
    })
}
