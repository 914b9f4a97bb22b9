//! Provider error taxonomy and the provider capability trait.

use std::future::Future;
use thiserror::Error;

use super::http::HttpError;
use crate::model::{BoardSnapshot, BoardView, LineStatus, ProviderKind, ServiceDetail, ServiceRef};

/// Errors surfaced by provider clients.
///
/// Every upstream failure mode is translated into one of these variants at
/// the provider boundary; nothing above this layer sees HTTP statuses or
/// transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The upstream request did not complete within the provider's timeout.
    #[error("upstream request timed out")]
    UpstreamTimeout,

    /// The upstream answered with a non-2xx status or was unreachable.
    #[error("upstream unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    /// The provider does not implement the requested view.
    #[error("view '{view}' is not supported by the {provider} provider")]
    UnsupportedView {
        provider: ProviderKind,
        view: BoardView,
    },

    /// The upstream does not recognize the resource identifier.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// The upstream answered 2xx but the payload could not be decoded.
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Translate a transport-level error for a request about `resource`.
    ///
    /// 404 means the resource identifier is unknown upstream; every other
    /// non-2xx status (auth failures included) and any transport failure
    /// means the upstream cannot answer right now.
    pub(crate) fn from_http(err: HttpError, resource: &str) -> Self {
        match err {
            HttpError::Timeout => ProviderError::UpstreamTimeout,
            HttpError::Status { status: 404 } => ProviderError::NotFound {
                resource: resource.to_string(),
            },
            HttpError::Status { status } => ProviderError::UpstreamUnavailable {
                reason: format!("HTTP {status}"),
            },
            HttpError::Transport(detail) => ProviderError::UpstreamUnavailable { reason: detail },
        }
    }

    pub(crate) fn invalid_json(context: &str, err: serde_json::Error) -> Self {
        ProviderError::InvalidResponse(format!("{context}: {err}"))
    }
}

/// Fetch capabilities implemented once per upstream provider.
///
/// The provider set is closed (see [`ProviderKind`]); callers select a
/// variant by tag and dispatch through this trait, never through runtime
/// type inspection.
pub trait ProviderClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Fetch the board for one station/stop resource.
    ///
    /// Returns [`ProviderError::UnsupportedView`] without attempting an
    /// outbound call when this provider does not implement `view`.
    fn fetch_board(
        &self,
        station_id: &str,
        view: BoardView,
    ) -> impl Future<Output = Result<BoardSnapshot, ProviderError>> + Send;

    /// Fetch and assemble the detail record for one linked service.
    fn fetch_service_detail(
        &self,
        service: &ServiceRef,
    ) -> impl Future<Output = Result<ServiceDetail, ProviderError>> + Send;

    /// Fetch line status, either for one line (`Some(line_id)`) or for the
    /// provider's default scope.
    fn fetch_line_status(
        &self,
        line_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<LineStatus>, ProviderError>> + Send;
}
