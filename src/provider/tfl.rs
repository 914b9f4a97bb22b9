//! Transport for London unified API client.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::http::AsyncHttpClient;
use super::types::{ProviderClient, ProviderError};
use crate::assembler::{self, DetailSource, LivePrediction, RouteSequence, SourceKind, TimetableFallback};
use crate::model::{
    BoardSnapshot, BoardView, LineStatus, ProviderKind, ServiceDetail, ServiceEntry, ServiceRef,
    ServiceStop,
};

/// TfL upstream settings.
#[derive(Debug, Clone)]
pub struct TflSettings {
    pub base_url: String,
    pub app_key: String,
    pub app_id: String,
    /// Transport modes used for the default line-status scope.
    pub modes: Vec<String>,
}

impl Default for TflSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.tfl.gov.uk".to_string(),
            app_key: String::new(),
            app_id: String::new(),
            modes: vec!["tube".to_string(), "overground".to_string()],
        }
    }
}

/// Client for the TfL unified API.
///
/// Boards are arrival predictions for a stop point; views are derived from
/// prediction directions (outbound for departures, inbound for arrivals).
/// The passing view has no TfL equivalent and is unsupported.
pub struct TflClient<H> {
    http: H,
    base_url: String,
    app_key: String,
    app_id: String,
    modes: Vec<String>,
}

fn normalize_direction(value: Option<&str>) -> Option<String> {
    let cleaned = value?.trim().to_lowercase();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

impl<H: AsyncHttpClient> TflClient<H> {
    pub fn new(http: H, settings: TflSettings) -> Self {
        Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            app_key: settings.app_key,
            app_id: settings.app_id,
            modes: settings.modes,
        }
    }

    /// Comma-joined mode list used for the default line-status scope.
    pub fn status_scope(&self) -> String {
        self.modes.join(",")
    }

    fn url(&self, path: &str, extra: &[(&str, &str)]) -> String {
        let mut url = format!("{}{}?app_key={}", self.base_url, path, self.app_key);
        if !self.app_id.is_empty() {
            url.push_str("&app_id=");
            url.push_str(&self.app_id);
        }
        for (name, value) in extra {
            url.push('&');
            url.push_str(name);
            url.push('=');
            url.push_str(value);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, &str)],
        resource: &str,
    ) -> Result<T, ProviderError> {
        let body = self
            .http
            .get(&self.url(path, extra))
            .await
            .map_err(|err| ProviderError::from_http(err, resource))?;
        serde_json::from_slice(&body).map_err(|err| ProviderError::invalid_json(resource, err))
    }

    async fn fetch_predictions(
        &self,
        stop_point_id: &str,
    ) -> Result<Vec<TflPredictionPayload>, ProviderError> {
        let resource = format!("stop point {stop_point_id}");
        let raw: Vec<serde_json::Value> = self
            .get_json(&format!("/StopPoint/{stop_point_id}/Arrivals"), &[], &resource)
            .await?;

        let mut predictions = Vec::with_capacity(raw.len());
        for item in raw {
            match serde_json::from_value::<TflPredictionPayload>(item) {
                Ok(prediction) => predictions.push(prediction),
                Err(err) => warn!(stop = %stop_point_id, error = %err, "skipping unparseable prediction"),
            }
        }

        predictions.sort_by_key(|p| {
            (
                p.time_to_station.unwrap_or(u32::MAX),
                p.expected_arrival.map(|t| t.timestamp()).unwrap_or(i64::MAX),
            )
        });
        Ok(predictions)
    }

    /// Common name for a stop point, used when the board has no predictions
    /// to borrow a station name from.
    async fn fetch_stop_name(&self, stop_point_id: &str) -> Option<String> {
        let resource = format!("stop point {stop_point_id}");
        let payload: TflStopPointPayload = match self
            .get_json(&format!("/StopPoint/{stop_point_id}"), &[], &resource)
            .await
        {
            Ok(payload) => payload,
            Err(err) => {
                debug!(stop = %stop_point_id, error = %err, "stop name lookup failed");
                return None;
            }
        };
        payload.common_name.or(payload.name)
    }

    async fn fetch_route_segment(
        &self,
        line_id: &str,
        direction_hint: Option<&str>,
        from_stop_id: &str,
        to_stop_id: &str,
    ) -> Result<Option<(String, Vec<TflSequencePoint>)>, ProviderError> {
        let directions: Vec<&str> = match direction_hint {
            Some("inbound") => vec!["inbound", "outbound"],
            Some("outbound") => vec!["outbound", "inbound"],
            _ => vec!["inbound", "outbound"],
        };

        let mut last_error = None;
        for direction in directions {
            let resource = format!("route {line_id}/{direction}");
            let payload: TflRouteSequencePayload = match self
                .get_json(
                    &format!("/Line/{line_id}/Route/Sequence/{direction}"),
                    &[("serviceTypes", "Regular")],
                    &resource,
                )
                .await
            {
                Ok(payload) => payload,
                Err(err) => {
                    last_error = Some(err);
                    continue;
                }
            };

            if let Some(segment) = segment_from_sequence(&payload, from_stop_id, to_stop_id) {
                return Ok(Some((direction.to_string(), segment)));
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    async fn fetch_timetable_etas(
        &self,
        line_id: &str,
        from_stop_id: &str,
        to_stop_id: &str,
    ) -> Result<HashMap<String, u32>, ProviderError> {
        let resource = format!("timetable {line_id}");
        let payload: TflTimetablePayload = self
            .get_json(
                &format!("/Line/{line_id}/Timetable/{from_stop_id}/to/{to_stop_id}"),
                &[],
                &resource,
            )
            .await?;
        Ok(timetable_eta_lookup(&payload))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TflPredictionPayload {
    station_name: Option<String>,
    line_id: Option<String>,
    line_name: Option<String>,
    platform_name: Option<String>,
    direction: Option<String>,
    trip_id: Option<String>,
    vehicle_id: Option<String>,
    destination_name: Option<String>,
    destination_naptan_id: Option<String>,
    towards: Option<String>,
    expected_arrival: Option<DateTime<Utc>>,
    time_to_station: Option<u32>,
}

impl TflPredictionPayload {
    fn direction(&self) -> Option<String> {
        normalize_direction(self.direction.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TflStopPointPayload {
    common_name: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TflLinePayload {
    id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    line_statuses: Vec<TflLineStatusPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TflLineStatusPayload {
    status_severity: Option<i32>,
    status_severity_description: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TflRouteSequencePayload {
    #[serde(default)]
    stop_point_sequences: Vec<TflStopSequence>,
}

#[derive(Debug, Deserialize)]
struct TflStopSequence {
    #[serde(default, rename = "stopPoint")]
    stop_point: Vec<TflSequencePoint>,
}

#[derive(Debug, Clone, Deserialize)]
struct TflSequencePoint {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TflTimetablePayload {
    timetable: Option<TflTimetableBody>,
}

#[derive(Debug, Deserialize)]
struct TflTimetableBody {
    #[serde(default)]
    routes: Vec<TflTimetableRoute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TflTimetableRoute {
    #[serde(default)]
    station_intervals: Vec<TflStationInterval>,
}

#[derive(Debug, Deserialize)]
struct TflStationInterval {
    #[serde(default)]
    intervals: Vec<TflInterval>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TflInterval {
    stop_id: Option<String>,
    time_to_arrival: Option<f64>,
}

/// The shortest stop run containing `from` before `to`, across all
/// sequences of one route direction.
fn segment_from_sequence(
    payload: &TflRouteSequencePayload,
    from_stop_id: &str,
    to_stop_id: &str,
) -> Option<Vec<TflSequencePoint>> {
    let mut candidates: Vec<Vec<TflSequencePoint>> = Vec::new();
    for sequence in &payload.stop_point_sequences {
        let ids: Vec<Option<&str>> = sequence.stop_point.iter().map(|p| p.id.as_deref()).collect();
        let from_index = ids.iter().position(|id| *id == Some(from_stop_id));
        let to_index = ids.iter().position(|id| *id == Some(to_stop_id));
        if let (Some(from_index), Some(to_index)) = (from_index, to_index) {
            if from_index <= to_index {
                candidates.push(sequence.stop_point[from_index..=to_index].to_vec());
            }
        }
    }
    candidates.into_iter().min_by_key(Vec::len)
}

/// Minimum minutes-to-arrival per stop across every route of the timetable.
fn timetable_eta_lookup(payload: &TflTimetablePayload) -> HashMap<String, u32> {
    let mut lookup: HashMap<String, u32> = HashMap::new();
    let routes = payload.timetable.as_ref().map(|t| &t.routes[..]).unwrap_or(&[]);
    for route in routes {
        for station_interval in &route.station_intervals {
            for interval in &station_interval.intervals {
                let (Some(stop_id), Some(eta)) = (&interval.stop_id, interval.time_to_arrival)
                else {
                    continue;
                };
                let minutes = eta.round() as u32;
                lookup
                    .entry(stop_id.clone())
                    .and_modify(|existing| *existing = (*existing).min(minutes))
                    .or_insert(minutes);
            }
        }
    }
    lookup
}

/// Pick the prediction a service reference points at.
///
/// Candidates are narrowed by line, then destination stop, then direction
/// (kept only when the directional subset is non-empty). Trip id is the
/// strongest tie-break, then vehicle id, then soonest arrival.
fn match_prediction<'a>(
    predictions: &'a [TflPredictionPayload],
    line_id: &str,
    to_stop_id: &str,
    direction: Option<&str>,
    trip_id: Option<&str>,
    vehicle_id: Option<&str>,
) -> Option<&'a TflPredictionPayload> {
    let target_line = line_id.trim().to_lowercase();
    let target_to = to_stop_id.trim().to_lowercase();
    let target_direction = normalize_direction(direction);

    let mut candidates: Vec<&TflPredictionPayload> = predictions
        .iter()
        .filter(|p| {
            p.line_id
                .as_deref()
                .map(|id| id.trim().to_lowercase() == target_line)
                .unwrap_or(false)
        })
        .collect();

    if !target_to.is_empty() {
        candidates.retain(|p| {
            p.destination_naptan_id
                .as_deref()
                .map(|id| id.trim().to_lowercase() == target_to)
                .unwrap_or(false)
        });
    }

    if let Some(target_direction) = &target_direction {
        let directional: Vec<&TflPredictionPayload> = candidates
            .iter()
            .copied()
            .filter(|p| p.direction().as_deref() == Some(target_direction))
            .collect();
        if !directional.is_empty() {
            candidates = directional;
        }
    }

    if candidates.is_empty() {
        return None;
    }

    let soonest =
        |p: &&TflPredictionPayload| p.time_to_station.map(u64::from).unwrap_or(u64::MAX);

    if let Some(target_trip) = trip_id.map(str::trim).filter(|t| !t.is_empty()) {
        let matches: Vec<&TflPredictionPayload> = candidates
            .iter()
            .copied()
            .filter(|p| p.trip_id.as_deref().map(str::trim) == Some(target_trip))
            .collect();
        if let Some(best) = matches.into_iter().min_by_key(soonest) {
            return Some(best);
        }
    }

    if let Some(target_vehicle) = vehicle_id.map(str::trim).filter(|v| !v.is_empty()) {
        let matches: Vec<&TflPredictionPayload> = candidates
            .iter()
            .copied()
            .filter(|p| p.vehicle_id.as_deref().map(str::trim) == Some(target_vehicle))
            .collect();
        if let Some(best) = matches.into_iter().min_by_key(soonest) {
            return Some(best);
        }
    }

    candidates.into_iter().min_by_key(soonest)
}

/// Narrow a prediction list to one view's rows.
///
/// Departures prefer outbound predictions, arrivals prefer inbound; rows
/// without a direction ride along. When the directional subset is empty
/// the full list is kept, since many stops report no direction at all.
fn predictions_for_view(
    predictions: Vec<TflPredictionPayload>,
    view: BoardView,
) -> Vec<TflPredictionPayload> {
    let wanted = match view {
        BoardView::Departures => "outbound",
        BoardView::Arrivals => "inbound",
        _ => return predictions,
    };

    let has_wanted = predictions
        .iter()
        .any(|p| p.direction().as_deref() == Some(wanted));
    if !has_wanted {
        return predictions;
    }

    predictions
        .into_iter()
        .filter(|p| {
            let direction = p.direction();
            direction.is_none() || direction.as_deref() == Some(wanted)
        })
        .collect()
}

fn entry_from_prediction(stop_point_id: &str, prediction: &TflPredictionPayload) -> ServiceEntry {
    let service = match (&prediction.line_id, &prediction.destination_naptan_id) {
        (Some(line_id), Some(to_stop_id)) => Some(ServiceRef::Transit {
            line_id: line_id.trim().to_lowercase(),
            from_stop_id: stop_point_id.to_string(),
            to_stop_id: to_stop_id.clone(),
            direction: prediction.direction(),
            trip_id: prediction.trip_id.clone(),
            vehicle_id: prediction.vehicle_id.clone(),
        }),
        _ => None,
    };

    ServiceEntry {
        service,
        destination: prediction
            .destination_name
            .clone()
            .or_else(|| prediction.towards.clone()),
        origin: None,
        platform: prediction.platform_name.clone(),
        operator: None,
        line_name: prediction.line_name.clone(),
        scheduled_departure: None,
        scheduled_arrival: None,
        estimated: None,
        expected_arrival: prediction.expected_arrival,
        time_to_station_secs: prediction.time_to_station,
        direction: prediction.direction(),
        is_cancelled: false,
    }
}

/// Detail sources backed by live TfL endpoints.
struct TflDetailSource<'a, H> {
    client: &'a TflClient<H>,
}

impl<H: AsyncHttpClient> DetailSource for TflDetailSource<'_, H> {
    fn supports(&self, _kind: SourceKind) -> bool {
        true
    }

    async fn live_prediction(
        &self,
        service: &ServiceRef,
    ) -> Result<Option<LivePrediction>, ProviderError> {
        let ServiceRef::Transit {
            line_id,
            from_stop_id,
            to_stop_id,
            direction,
            trip_id,
            vehicle_id,
        } = service
        else {
            return Ok(None);
        };

        let predictions = self.client.fetch_predictions(from_stop_id).await?;
        let matched = match_prediction(
            &predictions,
            line_id,
            to_stop_id,
            direction.as_deref(),
            trip_id.as_deref(),
            vehicle_id.as_deref(),
        );

        Ok(matched.map(|prediction| LivePrediction {
            line_name: prediction.line_name.clone(),
            destination_name: prediction
                .destination_name
                .clone()
                .or_else(|| prediction.towards.clone()),
            direction: prediction.direction(),
            expected_arrival: prediction.expected_arrival,
            eta_minutes: prediction.time_to_station.map(|secs| secs / 60),
            vehicle_id: prediction.vehicle_id.clone(),
            platform: prediction.platform_name.clone(),
        }))
    }

    async fn route_sequence(
        &self,
        service: &ServiceRef,
    ) -> Result<Option<RouteSequence>, ProviderError> {
        let ServiceRef::Transit {
            line_id,
            from_stop_id,
            to_stop_id,
            direction,
            ..
        } = service
        else {
            return Ok(None);
        };

        let segment = self
            .client
            .fetch_route_segment(line_id, direction.as_deref(), from_stop_id, to_stop_id)
            .await?;
        let Some((_, points)) = segment else {
            return Ok(None);
        };

        let stops: Vec<ServiceStop> = points
            .iter()
            .filter_map(|point| {
                let stop_id = point.id.clone()?;
                Some(ServiceStop {
                    stop_name: point.name.clone().unwrap_or_else(|| stop_id.clone()),
                    is_origin: stop_id == *from_stop_id,
                    is_destination: stop_id == *to_stop_id,
                    eta_minutes: None,
                    stop_id,
                })
            })
            .collect();

        Ok(Some(RouteSequence {
            origin_name: stops.iter().find(|s| s.is_origin).map(|s| s.stop_name.clone()),
            destination_name: stops
                .iter()
                .find(|s| s.is_destination)
                .map(|s| s.stop_name.clone()),
            stops,
        }))
    }

    async fn timetable(
        &self,
        service: &ServiceRef,
    ) -> Result<Option<TimetableFallback>, ProviderError> {
        let ServiceRef::Transit {
            line_id,
            from_stop_id,
            to_stop_id,
            ..
        } = service
        else {
            return Ok(None);
        };

        let lookup = self
            .client
            .fetch_timetable_etas(line_id, from_stop_id, to_stop_id)
            .await?;
        Ok(lookup.get(to_stop_id).map(|&eta_minutes| TimetableFallback {
            line_name: None,
            eta_minutes: Some(eta_minutes),
        }))
    }
}

impl<H: AsyncHttpClient> ProviderClient for TflClient<H> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Tfl
    }

    async fn fetch_board(
        &self,
        station_id: &str,
        view: BoardView,
    ) -> Result<BoardSnapshot, ProviderError> {
        if matches!(view, BoardView::Passing | BoardView::Status) {
            return Err(ProviderError::UnsupportedView {
                provider: ProviderKind::Tfl,
                view,
            });
        }

        let stop_point_id = station_id.trim().to_string();
        let predictions = self.fetch_predictions(&stop_point_id).await?;

        let station_name = match predictions.iter().find_map(|p| p.station_name.clone()) {
            Some(name) => name,
            None => self
                .fetch_stop_name(&stop_point_id)
                .await
                .unwrap_or_else(|| stop_point_id.clone()),
        };

        let rows = predictions_for_view(predictions, view);
        debug!(stop = %stop_point_id, %view, rows = rows.len(), "fetched tfl board");

        Ok(BoardSnapshot {
            provider: ProviderKind::Tfl,
            station_id: stop_point_id.clone(),
            station_name,
            view,
            generated_at: Utc::now(),
            services: rows
                .iter()
                .map(|prediction| entry_from_prediction(&stop_point_id, prediction))
                .collect(),
            messages: Vec::new(),
        })
    }

    async fn fetch_service_detail(
        &self,
        service: &ServiceRef,
    ) -> Result<ServiceDetail, ProviderError> {
        if !matches!(service, ServiceRef::Transit { .. }) {
            return Err(ProviderError::NotFound {
                resource: service.fingerprint(),
            });
        }
        assembler::assemble(&TflDetailSource { client: self }, service).await
    }

    async fn fetch_line_status(
        &self,
        line_id: Option<&str>,
    ) -> Result<Vec<LineStatus>, ProviderError> {
        let (path, resource) = match line_id {
            Some(line_id) => {
                let line_id = line_id.trim().to_lowercase();
                (format!("/Line/{line_id}/Status"), format!("line {line_id}"))
            }
            None => {
                let modes = self.modes.join(",");
                (format!("/Line/Mode/{modes}/Status"), format!("modes {modes}"))
            }
        };

        let lines: Vec<TflLinePayload> = self.get_json(&path, &[], &resource).await?;
        let mut statuses = Vec::new();
        for line in lines {
            let id = line.id.unwrap_or_else(|| "unknown".to_string());
            let name = line.name.unwrap_or_else(|| "Unknown".to_string());
            for status in line.line_statuses {
                statuses.push(LineStatus {
                    line_id: id.clone(),
                    line_name: name.clone(),
                    status_severity: status.status_severity,
                    status_description: status.status_severity_description,
                    reason: status.reason,
                });
            }
        }
        Ok(statuses)
    }
}
