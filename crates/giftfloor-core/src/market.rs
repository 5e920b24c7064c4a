//! Marketplace fetcher contract and its result types.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::gift::GiftQuery;
use crate::http::HttpError;

/// Supported marketplace identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketplaceId {
    Tonnel,
    Portals,
    Mrkt,
}

impl MarketplaceId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tonnel => "tonnel",
            Self::Portals => "portals",
            Self::Mrkt => "mrkt",
        }
    }

    /// Unit the marketplace quotes prices in.
    pub const fn price_unit(self) -> PriceUnit {
        match self {
            Self::Tonnel | Self::Portals => PriceUnit::Ton,
            Self::Mrkt => PriceUnit::NanoTon,
        }
    }
}

impl Display for MarketplaceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Native price unit of a marketplace's listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceUnit {
    Ton,
    NanoTon,
}

impl PriceUnit {
    pub fn to_ton(self, value: f64) -> f64 {
        match self {
            Self::Ton => value,
            Self::NanoTon => value / 1_000_000_000.0,
        }
    }
}

/// Outcome of one price query, in the marketplace's native unit.
///
/// `Unlisted` is a first-class success ("not currently listed") and must never
/// be conflated with `Failed` (retries exhausted, auth failure, malformed
/// response) by downstream rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceQuote {
    Listed(f64),
    Unlisted,
    Failed,
}

impl PriceQuote {
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    pub const fn listed(&self) -> Option<f64> {
        match self {
            Self::Listed(price) => Some(*price),
            _ => None,
        }
    }

    /// Lowest ask among the listings a query matched, or `Unlisted` when the
    /// result set is empty.
    pub fn from_lowest(lowest: Option<f64>) -> Self {
        match lowest {
            Some(price) => Self::Listed(price),
            None => Self::Unlisted,
        }
    }
}

/// The pair of quotes every marketplace produces for one gift:
/// variant-only and variant-plus-background.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketPrices {
    pub simple: PriceQuote,
    pub detailed: PriceQuote,
}

impl MarketPrices {
    pub const fn new(simple: PriceQuote, detailed: PriceQuote) -> Self {
        Self { simple, detailed }
    }

    /// Both queries failed (auth failure, retries exhausted, unexpected fault).
    pub const fn failed() -> Self {
        Self::new(PriceQuote::Failed, PriceQuote::Failed)
    }

    /// Nothing listed for either query (e.g. collection not found).
    pub const fn unlisted() -> Self {
        Self::new(PriceQuote::Unlisted, PriceQuote::Unlisted)
    }
}

/// Error raised by a single query attempt inside a fetcher. All classes are
/// retried identically, so one message-carrying type is enough; the retry
/// loop demotes the final error to [`PriceQuote::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for QueryError {}

impl From<HttpError> for QueryError {
    fn from(error: HttpError) -> Self {
        Self::new(error.message())
    }
}

/// Marketplace fetcher contract.
///
/// Implementations resolve their own session and auth material per call, run
/// the two price queries concurrently, and never let an error escape: every
/// failure mode lands in a [`PriceQuote`] state.
pub trait Marketplace: Send + Sync {
    fn id(&self) -> MarketplaceId;

    fn prices<'a>(
        &'a self,
        query: &'a GiftQuery,
    ) -> Pin<Box<dyn Future<Output = MarketPrices> + Send + 'a>>;
}
