//! National Rail live departure board client (LDBWS).

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::http::AsyncHttpClient;
use super::types::{ProviderClient, ProviderError};
use crate::assembler::{self, DetailSource, LivePrediction, RouteSequence, SourceKind, TimetableFallback};
use crate::model::{
    BoardSnapshot, BoardView, LineStatus, ProviderKind, ServiceDetail, ServiceEntry, ServiceRef,
    ServiceStop,
};

/// National Rail upstream settings.
#[derive(Debug, Clone)]
pub struct RailSettings {
    pub base_url: String,
    pub api_key: String,
}

impl Default for RailSettings {
    fn default() -> Self {
        Self {
            base_url:
                "https://api1.raildata.org.uk/1010-live-arrival-and-departure-boards-arr-and-dep1_1/LDBWS/api/20220120"
                    .to_string(),
            api_key: String::new(),
        }
    }
}

/// Client for the National Rail live departure board API.
///
/// Board rows carry scheduled/estimated clock times; the live status feed
/// and static timetable are not part of this upstream, so the status view
/// and the timetable detail source are unsupported.
pub struct RailClient<H> {
    http: H,
    base_url: String,
    api_key: String,
}

impl<H: AsyncHttpClient> RailClient<H> {
    pub fn new(http: H, settings: RailSettings) -> Self {
        Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        resource: &str,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let body = self
            .http
            .get_with_headers(&url, &[("x-apikey", &self.api_key)])
            .await
            .map_err(|err| ProviderError::from_http(err, resource))?;
        serde_json::from_slice(&body).map_err(|err| ProviderError::invalid_json(resource, err))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RailBoardPayload {
    location_name: Option<String>,
    crs: Option<String>,
    #[serde(default)]
    train_services: Vec<serde_json::Value>,
    #[serde(default)]
    nrcc_messages: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RailTrainPayload {
    sta: Option<String>,
    eta: Option<String>,
    std: Option<String>,
    etd: Option<String>,
    #[serde(default)]
    origin: Vec<RailLocation>,
    #[serde(default)]
    destination: Vec<RailLocation>,
    platform: Option<String>,
    operator: Option<String>,
    #[serde(rename = "serviceID")]
    service_id: Option<String>,
    #[serde(default)]
    is_cancelled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RailLocation {
    location_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RailServicePayload {
    operator: Option<String>,
    platform: Option<String>,
    #[serde(default)]
    origin: Vec<RailLocation>,
    #[serde(default)]
    destination: Vec<RailLocation>,
    #[serde(default)]
    previous_calling_points: Vec<RailCallingPointList>,
    #[serde(default)]
    subsequent_calling_points: Vec<RailCallingPointList>,
    location_name: Option<String>,
    crs: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RailCallingPointList {
    #[serde(default, rename = "callingPoint")]
    calling_point: Vec<RailCallingPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RailCallingPoint {
    location_name: String,
    crs: Option<String>,
}

fn first_location(locations: &[RailLocation]) -> Option<String> {
    locations.first().map(|loc| loc.location_name.clone())
}

/// NRCC messages arrive either as plain strings or `{"value": "..."}`.
fn extract_message(raw: &serde_json::Value) -> Option<String> {
    match raw {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Object(map) => map
            .get("value")
            .and_then(|value| value.as_str())
            .map(str::to_string),
        _ => None,
    }
}

fn entry_from_train(crs: &str, train: RailTrainPayload) -> ServiceEntry {
    let estimated = if train.std.is_some() {
        train.etd.clone().or(train.eta.clone())
    } else {
        train.eta.clone()
    };
    ServiceEntry {
        service: train.service_id.map(|service_id| ServiceRef::Rail {
            crs: crs.to_string(),
            service_id,
        }),
        destination: first_location(&train.destination),
        origin: first_location(&train.origin),
        platform: train.platform,
        operator: train.operator,
        line_name: None,
        scheduled_departure: train.std,
        scheduled_arrival: train.sta,
        estimated,
        expected_arrival: None,
        time_to_station_secs: None,
        direction: None,
        is_cancelled: train.is_cancelled,
    }
}

/// Detail sources backed by a single already-fetched service payload.
///
/// Both the live fields and the stop list come from one upstream response,
/// so the sources extract without further outbound calls.
struct RailDetailSource<'a> {
    payload: &'a RailServicePayload,
}

impl DetailSource for RailDetailSource<'_> {
    fn supports(&self, kind: SourceKind) -> bool {
        matches!(kind, SourceKind::Live | SourceKind::Route)
    }

    async fn live_prediction(
        &self,
        _service: &ServiceRef,
    ) -> Result<Option<LivePrediction>, ProviderError> {
        Ok(Some(LivePrediction {
            line_name: self.payload.operator.clone(),
            destination_name: first_location(&self.payload.destination),
            direction: None,
            expected_arrival: None,
            eta_minutes: None,
            vehicle_id: None,
            platform: self.payload.platform.clone(),
        }))
    }

    async fn route_sequence(
        &self,
        _service: &ServiceRef,
    ) -> Result<Option<RouteSequence>, ProviderError> {
        let previous = self
            .payload
            .previous_calling_points
            .iter()
            .flat_map(|list| list.calling_point.iter());
        let subsequent = self
            .payload
            .subsequent_calling_points
            .iter()
            .flat_map(|list| list.calling_point.iter());

        let mut stops: Vec<ServiceStop> = previous
            .map(|point| ServiceStop {
                stop_id: point.crs.clone().unwrap_or_else(|| point.location_name.clone()),
                stop_name: point.location_name.clone(),
                eta_minutes: None,
                is_origin: false,
                is_destination: false,
            })
            .collect();

        if let (Some(name), Some(crs)) = (&self.payload.location_name, &self.payload.crs) {
            stops.push(ServiceStop {
                stop_id: crs.clone(),
                stop_name: name.clone(),
                eta_minutes: None,
                is_origin: false,
                is_destination: false,
            });
        }

        stops.extend(subsequent.map(|point| ServiceStop {
            stop_id: point.crs.clone().unwrap_or_else(|| point.location_name.clone()),
            stop_name: point.location_name.clone(),
            eta_minutes: None,
            is_origin: false,
            is_destination: false,
        }));

        if let Some(first) = stops.first_mut() {
            first.is_origin = true;
        }
        if let Some(last) = stops.last_mut() {
            last.is_destination = true;
        }

        Ok(Some(RouteSequence {
            origin_name: first_location(&self.payload.origin),
            destination_name: first_location(&self.payload.destination),
            stops,
        }))
    }

    async fn timetable(
        &self,
        _service: &ServiceRef,
    ) -> Result<Option<TimetableFallback>, ProviderError> {
        Ok(None)
    }
}

impl<H: AsyncHttpClient> ProviderClient for RailClient<H> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::NationalRail
    }

    async fn fetch_board(
        &self,
        station_id: &str,
        view: BoardView,
    ) -> Result<BoardSnapshot, ProviderError> {
        if view == BoardView::Status {
            return Err(ProviderError::UnsupportedView {
                provider: ProviderKind::NationalRail,
                view,
            });
        }

        let crs = station_id.trim().to_uppercase();
        let resource = format!("board {crs}");
        let payload: RailBoardPayload = self
            .get_json(&format!("/GetArrivalDepartureBoard/{crs}"), &resource)
            .await?;

        let board_crs = payload.crs.clone().unwrap_or_else(|| crs.clone());
        let mut services = Vec::with_capacity(payload.train_services.len());
        for raw in payload.train_services {
            // Tolerate malformed rows; one bad service must not sink the
            // whole board.
            match serde_json::from_value::<RailTrainPayload>(raw) {
                Ok(train) => services.push(entry_from_train(&board_crs, train)),
                Err(err) => warn!(crs = %board_crs, error = %err, "skipping unparseable board row"),
            }
        }

        services.retain(|entry| match view {
            BoardView::Departures => entry.is_departing(),
            BoardView::Arrivals => entry.is_arriving(),
            BoardView::Passing => entry.is_passing(),
            BoardView::Status => false,
        });
        debug!(crs = %board_crs, %view, rows = services.len(), "fetched rail board");

        Ok(BoardSnapshot {
            provider: ProviderKind::NationalRail,
            station_id: board_crs,
            station_name: payload.location_name.unwrap_or(crs),
            view,
            generated_at: chrono::Utc::now(),
            services,
            messages: payload
                .nrcc_messages
                .iter()
                .filter_map(extract_message)
                .collect(),
        })
    }

    async fn fetch_service_detail(
        &self,
        service: &ServiceRef,
    ) -> Result<ServiceDetail, ProviderError> {
        let ServiceRef::Rail { service_id, .. } = service else {
            return Err(ProviderError::NotFound {
                resource: service.fingerprint(),
            });
        };

        let resource = format!("service {service_id}");
        let payload: RailServicePayload = self
            .get_json(&format!("/GetServiceDetails/{service_id}"), &resource)
            .await?;

        assembler::assemble(&RailDetailSource { payload: &payload }, service).await
    }

    async fn fetch_line_status(
        &self,
        _line_id: Option<&str>,
    ) -> Result<Vec<LineStatus>, ProviderError> {
        Err(ProviderError::UnsupportedView {
            provider: ProviderKind::NationalRail,
            view: BoardView::Status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DetailTier;
    use crate::provider::http::tests::MockHttpClient;

    const BOARD_JSON: &str = r#"{
        "locationName": "Leatherhead",
        "crs": "LHD",
        "trainServices": [
            {
                "std": "18:35",
                "etd": "On time",
                "origin": [{"locationName": "Dorking", "crs": "DKG"}],
                "destination": [{"locationName": "London Waterloo", "crs": "WAT"}],
                "platform": "2",
                "operator": "South Western Railway",
                "serviceID": "svc-1"
            },
            {
                "sta": "18:33",
                "std": "18:34",
                "eta": "On time",
                "etd": "On time",
                "origin": [{"locationName": "Guildford", "crs": "GLD"}],
                "destination": [{"locationName": "London Victoria", "crs": "VIC"}],
                "serviceID": "svc-2"
            },
            {
                "sta": "18:40",
                "eta": "18:45",
                "origin": [{"locationName": "London Waterloo", "crs": "WAT"}],
                "destination": [{"locationName": "Leatherhead", "crs": "LHD"}],
                "serviceID": "svc-3"
            },
            {"std": 12345}
        ],
        "nrccMessages": [{"value": "Engineering works this weekend."}]
    }"#;

    const SERVICE_JSON: &str = r#"{
        "generatedAt": "2026-08-30T18:30:00Z",
        "locationName": "Leatherhead",
        "crs": "LHD",
        "operator": "South Western Railway",
        "std": "18:35",
        "etd": "On time",
        "platform": "2",
        "serviceID": "svc-1",
        "origin": [{"locationName": "Dorking", "crs": "DKG"}],
        "destination": [{"locationName": "London Waterloo", "crs": "WAT"}],
        "previousCallingPoints": [
            {"callingPoint": [{"locationName": "Dorking", "crs": "DKG", "st": "18:28"}]}
        ],
        "subsequentCallingPoints": [
            {"callingPoint": [
                {"locationName": "Epsom", "crs": "EPS", "st": "18:41"},
                {"locationName": "London Waterloo", "crs": "WAT", "st": "19:12"}
            ]}
        ]
    }"#;

    fn client(mock: MockHttpClient) -> RailClient<MockHttpClient> {
        RailClient::new(
            mock,
            RailSettings {
                base_url: "https://rail.example/api".to_string(),
                api_key: "test-key".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_departures_view_keeps_departing_rows() {
        let rail = client(MockHttpClient::new().respond("/GetArrivalDepartureBoard/LHD", BOARD_JSON));
        let board = rail.fetch_board("lhd", BoardView::Departures).await.unwrap();

        assert_eq!(board.station_id, "LHD");
        assert_eq!(board.station_name, "Leatherhead");
        assert_eq!(board.services.len(), 2);
        assert!(board.services.iter().all(ServiceEntry::is_departing));
        assert_eq!(board.messages, vec!["Engineering works this weekend."]);
    }

    #[tokio::test]
    async fn test_arrivals_view_keeps_arriving_rows() {
        let rail = client(MockHttpClient::new().respond("/GetArrivalDepartureBoard/LHD", BOARD_JSON));
        let board = rail.fetch_board("LHD", BoardView::Arrivals).await.unwrap();
        assert_eq!(board.services.len(), 2);
        assert!(board.services.iter().all(ServiceEntry::is_arriving));
    }

    #[tokio::test]
    async fn test_passing_view_requires_both_times() {
        let rail = client(MockHttpClient::new().respond("/GetArrivalDepartureBoard/LHD", BOARD_JSON));
        let board = rail.fetch_board("LHD", BoardView::Passing).await.unwrap();

        assert_eq!(board.services.len(), 1);
        let entry = &board.services[0];
        assert_eq!(
            entry.service,
            Some(ServiceRef::Rail {
                crs: "LHD".into(),
                service_id: "svc-2".into()
            })
        );
    }

    #[tokio::test]
    async fn test_malformed_row_is_skipped_not_fatal() {
        let rail = client(MockHttpClient::new().respond("/GetArrivalDepartureBoard/LHD", BOARD_JSON));
        let board = rail.fetch_board("LHD", BoardView::Departures).await.unwrap();
        // BOARD_JSON carries four rows, one unparseable.
        assert_eq!(board.services.len(), 2);
    }

    #[tokio::test]
    async fn test_status_view_is_unsupported_without_outbound_call() {
        let mock = MockHttpClient::new().respond("/GetArrivalDepartureBoard/LHD", BOARD_JSON);
        let rail = client(mock);
        let err = rail.fetch_board("LHD", BoardView::Status).await.unwrap_err();

        assert!(matches!(err, ProviderError::UnsupportedView { .. }));
        assert_eq!(rail.http.call_count(), 0);
    }

    #[tokio::test]
    async fn test_api_key_header_is_sent() {
        let rail = client(MockHttpClient::new().respond("/GetArrivalDepartureBoard/LHD", BOARD_JSON));
        rail.fetch_board("LHD", BoardView::Departures).await.unwrap();
        assert_eq!(rail.http.last_header("x-apikey").as_deref(), Some("test-key"));
    }

    #[tokio::test]
    async fn test_unknown_station_is_not_found() {
        let rail = client(MockHttpClient::new());
        let err = rail.fetch_board("ZZZ", BoardView::Departures).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::NotFound {
                resource: "board ZZZ".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_service_detail_assembles_live_tier() {
        let rail = client(MockHttpClient::new().respond("/GetServiceDetails/svc-1", SERVICE_JSON));
        let service = ServiceRef::Rail {
            crs: "LHD".into(),
            service_id: "svc-1".into(),
        };

        let detail = rail.fetch_service_detail(&service).await.unwrap();
        assert_eq!(detail.tier, DetailTier::Live);
        assert_eq!(detail.origin_name.as_deref(), Some("Dorking"));
        assert_eq!(detail.destination_name.as_deref(), Some("London Waterloo"));
        assert_eq!(detail.platform.as_deref(), Some("2"));

        // Dorking, Leatherhead, Epsom, Waterloo in route order.
        let names: Vec<&str> = detail.stops.iter().map(|s| s.stop_name.as_str()).collect();
        assert_eq!(names, vec!["Dorking", "Leatherhead", "Epsom", "London Waterloo"]);
        assert!(detail.stops.first().unwrap().is_origin);
        assert!(detail.stops.last().unwrap().is_destination);
    }

    #[tokio::test]
    async fn test_line_status_is_unsupported() {
        let rail = client(MockHttpClient::new());
        let err = rail.fetch_line_status(None).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedView { .. }));
        assert_eq!(rail.http.call_count(), 0);
    }
}
