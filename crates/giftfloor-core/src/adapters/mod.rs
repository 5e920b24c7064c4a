//! Marketplace fetcher implementations.
//!
//! Each adapter owns one upstream's wire format and auth flow and exposes it
//! through the [`crate::market::Marketplace`] trait. Portals and MRKT resolve
//! mini-app init-data through the session layer; Tonnel is queried without a
//! session.

pub mod mrkt;
pub mod portals;
pub mod tonnel;

pub use mrkt::MrktMarketplace;
pub use portals::PortalsMarketplace;
pub use tonnel::TonnelMarketplace;
