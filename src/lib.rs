//! Liveboard - caching and prefetch core for live transit departure boards.
//!
//! This library serves live departure/arrival data from two upstream
//! providers (National Rail and Transport for London) behind a shared
//! TTL cache, and warms likely-next-requested service details via a
//! background prefetch coordinator.
//!
//! # High-Level API
//!
//! Most callers go through the [`service`] facade:
//!
//! ```ignore
//! use liveboard::config::Settings;
//! use liveboard::model::{BoardView, ProviderKind};
//! use liveboard::service::BoardService;
//!
//! let settings = Settings::from_env();
//! let service = BoardService::from_settings(&settings)?;
//!
//! let board = service
//!     .get_board(ProviderKind::NationalRail, "LHD", BoardView::Departures)
//!     .await?;
//! ```
//!
//! A cache hit returns immediately; a miss fetches live data, caches it,
//! and hands the board to the [`prefetch`] coordinator which warms the
//! detail cache for every linked service in the background.

pub mod assembler;
pub mod cache;
pub mod config;
pub mod model;
pub mod prefetch;
pub mod provider;
pub mod service;

/// Version of the liveboard library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
