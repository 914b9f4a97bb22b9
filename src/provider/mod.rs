//! Upstream provider clients.
//!
//! Each provider implements [`ProviderClient`] over an injected
//! [`AsyncHttpClient`]; [`Providers`] routes calls to the right client by
//! provider tag.

pub mod http;
pub mod rail;
pub mod tfl;
pub mod types;

pub use http::{AsyncHttpClient, HttpError, ReqwestClient};
pub use rail::{RailClient, RailSettings};
pub use tfl::{TflClient, TflSettings};
pub use types::{ProviderClient, ProviderError};

use crate::model::{
    BoardSnapshot, BoardView, LineStatus, ProviderKind, ServiceDetail, ServiceRef,
};

/// The closed set of provider clients, routed by [`ProviderKind`].
pub struct Providers<H> {
    rail: RailClient<H>,
    tfl: TflClient<H>,
}

impl<H: AsyncHttpClient + Clone> Providers<H> {
    pub fn new(http: H, rail: RailSettings, tfl: TflSettings) -> Self {
        Self {
            rail: RailClient::new(http.clone(), rail),
            tfl: TflClient::new(http, tfl),
        }
    }
}

impl<H: AsyncHttpClient> Providers<H> {
    pub async fn fetch_board(
        &self,
        provider: ProviderKind,
        station_id: &str,
        view: BoardView,
    ) -> Result<BoardSnapshot, ProviderError> {
        match provider {
            ProviderKind::NationalRail => self.rail.fetch_board(station_id, view).await,
            ProviderKind::Tfl => self.tfl.fetch_board(station_id, view).await,
        }
    }

    /// Dispatch to the provider the service reference belongs to.
    pub async fn fetch_service_detail(
        &self,
        service: &ServiceRef,
    ) -> Result<ServiceDetail, ProviderError> {
        match service.provider() {
            ProviderKind::NationalRail => self.rail.fetch_service_detail(service).await,
            ProviderKind::Tfl => self.tfl.fetch_service_detail(service).await,
        }
    }

    pub async fn fetch_line_status(
        &self,
        provider: ProviderKind,
        line_id: Option<&str>,
    ) -> Result<Vec<LineStatus>, ProviderError> {
        match provider {
            ProviderKind::NationalRail => self.rail.fetch_line_status(line_id).await,
            ProviderKind::Tfl => self.tfl.fetch_line_status(line_id).await,
        }
    }

    /// The cache scope a line-status request resolves to: the line id when
    /// one is given, otherwise the provider's default query scope (the
    /// configured mode list for TfL). Workers configured with different
    /// mode lists must not share a status entry.
    pub fn line_status_scope(&self, provider: ProviderKind, line_id: Option<&str>) -> String {
        match (line_id, provider) {
            (Some(line_id), _) => line_id.trim().to_lowercase(),
            (None, ProviderKind::Tfl) => self.tfl.status_scope(),
            (None, ProviderKind::NationalRail) => "all".to_string(),
        }
    }
}
