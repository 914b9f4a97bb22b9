//! Assembled service detail records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::board::ServiceRef;

/// How complete an assembled detail record is.
///
/// Downstream consumers use this to distinguish a fully live answer from
/// a timetable-derived approximation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetailTier {
    /// A live prediction matched and the route sequence supplied the stops.
    Live,
    /// A live prediction matched but stops came from a fallback source
    /// (or are missing entirely).
    Partial,
    /// No live prediction matched; everything is schedule-derived.
    TimetableOnly,
}

/// One stop on a service's route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceStop {
    pub stop_id: String,
    pub stop_name: String,
    pub eta_minutes: Option<u32>,
    pub is_origin: bool,
    pub is_destination: bool,
}

/// Best-effort detail record for a single service.
///
/// Each field is independently nullable: the assembler fills them from the
/// highest-priority source that has them (live prediction, then route
/// sequence, then static timetable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetail {
    pub service: ServiceRef,
    pub line_name: Option<String>,
    pub origin_name: Option<String>,
    pub destination_name: Option<String>,
    pub direction: Option<String>,
    pub expected_arrival: Option<DateTime<Utc>>,
    /// Minutes until arrival at the queried stop, from the live prediction
    /// or, failing that, the static timetable.
    pub eta_minutes: Option<u32>,
    pub vehicle_id: Option<String>,
    pub platform: Option<String>,
    pub stops: Vec<ServiceStop>,
    pub tier: DetailTier,
    pub pulled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_roundtrips_through_json() {
        let detail = ServiceDetail {
            service: ServiceRef::Rail {
                crs: "LHD".into(),
                service_id: "ABC".into(),
            },
            line_name: None,
            origin_name: Some("Leatherhead".into()),
            destination_name: Some("London Waterloo".into()),
            direction: None,
            expected_arrival: None,
            eta_minutes: None,
            vehicle_id: None,
            platform: Some("2".into()),
            stops: vec![ServiceStop {
                stop_id: "LHD".into(),
                stop_name: "Leatherhead".into(),
                eta_minutes: Some(0),
                is_origin: true,
                is_destination: false,
            }],
            tier: DetailTier::Partial,
            pulled_at: Utc::now(),
        };

        let bytes = serde_json::to_vec(&detail).unwrap();
        let decoded: ServiceDetail = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, detail);
    }
}
