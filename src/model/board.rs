//! Board snapshot types: providers, views, service rows, and service links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream data providers, selected by a stable tag.
///
/// The set is closed: adding a provider means adding a variant here and a
/// client implementation, never runtime type inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// National Rail live departure boards (LDBWS).
    NationalRail,
    /// Transport for London unified API.
    Tfl,
}

impl ProviderKind {
    /// Stable tag used in cache keys and job fingerprints.
    pub fn tag(&self) -> &'static str {
        match self {
            ProviderKind::NationalRail => "nr",
            ProviderKind::Tfl => "tfl",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The view of a board a caller requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoardView {
    Departures,
    Arrivals,
    /// Services that both arrive at and depart from the station.
    /// Only meaningful for National Rail boards.
    Passing,
    /// Line status for the lines serving a resource.
    Status,
}

impl BoardView {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoardView::Departures => "departures",
            BoardView::Arrivals => "arrivals",
            BoardView::Passing => "passing",
            BoardView::Status => "status",
        }
    }
}

impl fmt::Display for BoardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to an individual service surfaced on a board.
///
/// This is the link the prefetch coordinator follows: each variant carries
/// the identifiers its provider needs to fetch the service's detail record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceRef {
    /// A National Rail service at a station.
    Rail { crs: String, service_id: String },
    /// A TfL prediction between two stop points on a line.
    Transit {
        line_id: String,
        from_stop_id: String,
        to_stop_id: String,
        direction: Option<String>,
        trip_id: Option<String>,
        vehicle_id: Option<String>,
    },
}

impl ServiceRef {
    pub fn provider(&self) -> ProviderKind {
        match self {
            ServiceRef::Rail { .. } => ProviderKind::NationalRail,
            ServiceRef::Transit { .. } => ProviderKind::Tfl,
        }
    }

    /// Stable identifier used to deduplicate prefetch work.
    ///
    /// Derived only from provider and resource identifiers, so the same
    /// service yields the same fingerprint no matter which request
    /// triggered it.
    pub fn fingerprint(&self) -> String {
        match self {
            ServiceRef::Rail { crs, service_id } => {
                format!("nr:{}:{}", crs.to_uppercase(), service_id)
            }
            ServiceRef::Transit {
                line_id,
                from_stop_id,
                to_stop_id,
                direction,
                trip_id,
                vehicle_id,
            } => format!(
                "tfl:{}:{}:{}:{}:{}:{}",
                line_id.to_lowercase(),
                from_stop_id.to_lowercase(),
                to_stop_id.to_lowercase(),
                direction.as_deref().unwrap_or(""),
                trip_id.as_deref().unwrap_or(""),
                vehicle_id.as_deref().unwrap_or(""),
            ),
        }
    }
}

/// One row on a board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Link to the service's detail record, when the upstream row carried
    /// enough identifiers to build one.
    pub service: Option<ServiceRef>,
    pub destination: Option<String>,
    pub origin: Option<String>,
    pub platform: Option<String>,
    pub operator: Option<String>,
    pub line_name: Option<String>,
    /// Scheduled times as upstream clock strings ("18:35"), rail only.
    pub scheduled_departure: Option<String>,
    pub scheduled_arrival: Option<String>,
    /// Estimated time display ("On time", "18:40"), rail only.
    pub estimated: Option<String>,
    /// Absolute expected arrival, TfL only.
    pub expected_arrival: Option<DateTime<Utc>>,
    pub time_to_station_secs: Option<u32>,
    /// Normalized direction ("inbound"/"outbound"), TfL only.
    pub direction: Option<String>,
    pub is_cancelled: bool,
}

impl ServiceEntry {
    /// A rail row departs when it has a scheduled departure time.
    pub fn is_departing(&self) -> bool {
        self.scheduled_departure.is_some()
    }

    /// A rail row arrives when it has a scheduled arrival time.
    pub fn is_arriving(&self) -> bool {
        self.scheduled_arrival.is_some()
    }

    /// A rail row passes through when it both arrives and departs.
    pub fn is_passing(&self) -> bool {
        self.is_arriving() && self.is_departing()
    }
}

/// Status summary for one line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStatus {
    pub line_id: String,
    pub line_name: String,
    pub status_severity: Option<i32>,
    pub status_description: Option<String>,
    pub reason: Option<String>,
}

/// A fetched board: the list of upcoming services for one station/stop.
///
/// Produced by a provider client, returned to the caller, and consumed by
/// the prefetch coordinator as the source of service links to warm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub provider: ProviderKind,
    pub station_id: String,
    pub station_name: String,
    pub view: BoardView,
    pub generated_at: DateTime<Utc>,
    pub services: Vec<ServiceEntry>,
    /// Operational messages attached to the board (NRCC messages, etc).
    pub messages: Vec<String>,
}

impl BoardSnapshot {
    /// Distinct service links on this board, in row order.
    pub fn linked_services(&self) -> Vec<ServiceRef> {
        let mut seen = std::collections::HashSet::new();
        self.services
            .iter()
            .filter_map(|entry| entry.service.clone())
            .filter(|service| seen.insert(service.fingerprint()))
            .collect()
    }
}
