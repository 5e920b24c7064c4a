//! Core engine for aggregating collectible-gift floor prices.
//!
//! Given one gift's attributes the engine queries every supported
//! marketplace concurrently for two floor prices (variant-only and
//! variant-plus-background), resolves the TON→USD and USDT→IRR exchange
//! rates through a TTL cache, and merges everything into one report in
//! which each marketplace can independently succeed, report no listings,
//! or fail.

pub mod adapters;
pub mod aggregator;
pub mod config;
pub mod gift;
pub mod http;
pub mod market;
pub mod rates;
pub mod retry;
pub mod session;
pub mod webapp;

pub use adapters::{MrktMarketplace, PortalsMarketplace, TonnelMarketplace};
pub use aggregator::Aggregator;
pub use config::Settings;
pub use gift::{GiftIdentity, GiftQuery, GiftQueryError};
pub use http::{
    ConnectionPool, HttpAuth, HttpClient, HttpConfig, HttpError, HttpMethod, HttpRequest,
    HttpResponse, NoopHttpClient, PooledHttpClient,
};
pub use market::{MarketPrices, Marketplace, MarketplaceId, PriceQuote, PriceUnit, QueryError};
pub use rates::{format_toman, ExchangeRates, RateResolver};
pub use retry::RetryPolicy;
pub use session::{
    MarketSession, SessionConnector, SessionError, SessionFuture, SessionManager,
    StoredCredentials, StoredSessionConnector,
};
pub use webapp::{extract_init_data, webapp_init_data};
