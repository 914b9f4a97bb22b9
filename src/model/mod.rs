//! Domain model shared by the cache, providers, and prefetch coordinator.

mod board;
mod detail;

pub use board::{
    BoardSnapshot, BoardView, LineStatus, ProviderKind, ServiceEntry, ServiceRef,
};
pub use detail::{DetailTier, ServiceDetail, ServiceStop};
