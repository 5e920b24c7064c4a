//! Portals marketplace adapter.
//!
//! Two-step flow: resolve the collection name to a collection id via the
//! collections search endpoint, then query the cheapest listed NFT twice, with
//! and without the background facet. Both search calls authenticate with
//! mini-app init-data minted per fetch.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::PortalsSettings;
use crate::gift::GiftQuery;
use crate::http::{HttpAuth, HttpClient, HttpRequest};
use crate::market::{MarketPrices, Marketplace, MarketplaceId, PriceQuote, QueryError};
use crate::retry::RetryPolicy;
use crate::session::SessionManager;
use crate::webapp::webapp_init_data;

pub struct PortalsMarketplace {
    http: Arc<dyn HttpClient>,
    sessions: Arc<SessionManager>,
    settings: PortalsSettings,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct CollectionsResponse {
    #[serde(default)]
    collections: Vec<PortalsCollection>,
}

#[derive(Debug, Deserialize)]
struct PortalsCollection {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ListingsResponse {
    #[serde(default)]
    results: Vec<PortalsListing>,
}

#[derive(Debug, Deserialize)]
struct PortalsListing {
    /// Portals serializes prices inconsistently, sometimes as a JSON number
    /// and sometimes as a decimal string.
    price: serde_json::Value,
}

impl PortalsListing {
    fn price_ton(&self) -> Option<f64> {
        match &self.price {
            serde_json::Value::Number(number) => number.as_f64(),
            serde_json::Value::String(text) => text.parse().ok(),
            _ => None,
        }
    }
}

impl PortalsMarketplace {
    pub fn new(
        http: Arc<dyn HttpClient>,
        sessions: Arc<SessionManager>,
        settings: PortalsSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            sessions,
            settings,
            retry,
        }
    }

    async fn fetch(&self, query: &GiftQuery) -> MarketPrices {
        let init_data = match webapp_init_data(
            &self.sessions,
            &self.settings.identity,
            &self.settings.bot,
            &self.settings.app_short_name,
            &self.settings.platform,
        )
        .await
        {
            Some(init_data) => init_data,
            None => return MarketPrices::failed(),
        };
        let auth = HttpAuth::MiniApp(init_data);

        let collection_id = match self.collection_id(&auth, &query.collection).await {
            Some(id) => id,
            None => {
                tracing::info!(
                    collection = query.collection.as_str(),
                    "portals collection did not resolve"
                );
                return MarketPrices::unlisted();
            }
        };

        let (simple, detailed) = tokio::join!(
            self.lowest_ask(&auth, &collection_id, query, false),
            self.lowest_ask(&auth, &collection_id, query, true),
        );
        MarketPrices::new(simple, detailed)
    }

    /// Resolves the collection name to its id in a single attempt. Every
    /// failure collapses to `None`, indistinguishable from an unknown
    /// collection.
    async fn collection_id(&self, auth: &HttpAuth, collection: &str) -> Option<String> {
        let url = format!(
            "{}/collections?search={}",
            self.settings.api_url,
            urlencoding::encode(collection)
        );
        let request = HttpRequest::get(url)
            .with_auth(auth)
            .with_timeout(self.settings.timeout);

        let response = match self.http.execute(request).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                tracing::error!(
                    status = response.status,
                    "portals collections returned an error status"
                );
                return None;
            }
            Err(error) => {
                tracing::error!(%error, "portals collection lookup failed");
                return None;
            }
        };

        let parsed: CollectionsResponse = match serde_json::from_str(&response.body) {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::error!(%error, "malformed portals collections response");
                return None;
            }
        };

        parsed.collections.into_iter().next().map(|c| c.id)
    }

    fn search_url(&self, collection_id: &str, query: &GiftQuery, with_background: bool) -> String {
        let mut url = format!(
            "{}/nfts/search?offset=0&limit=1&collection_ids={}&filter_by_models={}&sort_by={}&status=listed&premarket_status=all",
            self.settings.api_url,
            urlencoding::encode(collection_id),
            urlencoding::encode(&query.variant),
            urlencoding::encode("price asc"),
        );
        if with_background && !query.background.is_empty() {
            url.push_str("&filter_by_backdrops=");
            url.push_str(&urlencoding::encode(&query.background));
        }
        url
    }

    async fn lowest_ask(
        &self,
        auth: &HttpAuth,
        collection_id: &str,
        query: &GiftQuery,
        with_background: bool,
    ) -> PriceQuote {
        let url = self.search_url(collection_id, query, with_background);

        let outcome = self
            .retry
            .run("portals search", || {
                let request = HttpRequest::get(url.clone())
                    .with_auth(auth)
                    .with_timeout(self.settings.timeout);
                async move {
                    let response = self.http.execute(request).await?;
                    if !response.is_success() {
                        return Err(QueryError::new(format!(
                            "portals search returned status {}",
                            response.status
                        )));
                    }
                    let parsed: ListingsResponse =
                        serde_json::from_str(&response.body).map_err(|error| {
                            QueryError::new(format!("malformed portals search response: {error}"))
                        })?;
                    Ok(parsed
                        .results
                        .iter()
                        .filter_map(PortalsListing::price_ton)
                        .reduce(f64::min))
                }
            })
            .await;

        match outcome {
            Ok(lowest) => PriceQuote::from_lowest(lowest),
            Err(_) => PriceQuote::Failed,
        }
    }
}

impl Marketplace for PortalsMarketplace {
    fn id(&self) -> MarketplaceId {
        MarketplaceId::Portals
    }

    fn prices<'a>(
        &'a self,
        query: &'a GiftQuery,
    ) -> Pin<Box<dyn Future<Output = MarketPrices> + Send + 'a>> {
        Box::pin(self.fetch(query))
    }
}
