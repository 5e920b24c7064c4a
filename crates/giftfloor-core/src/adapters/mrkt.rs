//! MRKT marketplace adapter.
//!
//! Exchanges mini-app init-data for a bearer token via the auth endpoint,
//! then queries the cheapest sale twice through the saling endpoint. Prices
//! come back in nanoTON and are reported in that native unit; display-layer
//! conversion happens downstream.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::MrktSettings;
use crate::gift::GiftQuery;
use crate::http::{HttpAuth, HttpClient, HttpRequest};
use crate::market::{MarketPrices, Marketplace, MarketplaceId, PriceQuote, QueryError};
use crate::retry::RetryPolicy;
use crate::session::SessionManager;
use crate::webapp::webapp_init_data;

pub struct MrktMarketplace {
    http: Arc<dyn HttpClient>,
    sessions: Arc<SessionManager>,
    settings: MrktSettings,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SalingResponse {
    #[serde(default)]
    gifts: Vec<MrktGift>,
}

#[derive(Debug, Deserialize)]
struct MrktGift {
    #[serde(rename = "salePrice")]
    sale_price: Option<f64>,
}

impl MrktMarketplace {
    pub fn new(
        http: Arc<dyn HttpClient>,
        sessions: Arc<SessionManager>,
        settings: MrktSettings,
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

        let auth = match self.auth_token(&init_data).await {
            Ok(token) => HttpAuth::BearerToken(token),
            Err(error) => {
                tracing::error!(%error, "mrkt authentication failed");
                return MarketPrices::failed();
            }
        };

        let (simple, detailed) = tokio::join!(
            self.lowest_ask(&auth, query, false),
            self.lowest_ask(&auth, query, true),
        );
        MarketPrices::new(simple, detailed)
    }

    /// Trades init-data for a short-lived bearer token. Single attempt: an
    /// auth failure fails the whole fetch immediately, only the price
    /// queries themselves are retried.
    async fn auth_token(&self, init_data: &str) -> Result<String, QueryError> {
        let url = format!("{}/auth", self.settings.api_url);
        let payload = serde_json::json!({"data": init_data}).to_string();
        let request = HttpRequest::post(url)
            .with_json_body(payload)
            .with_timeout(self.settings.auth_timeout);

        let response = self.http.execute(request).await?;
        if !response.is_success() {
            return Err(QueryError::new(format!(
                "mrkt auth returned status {}",
                response.status
            )));
        }
        let parsed: AuthResponse = serde_json::from_str(&response.body)
            .map_err(|error| QueryError::new(format!("malformed mrkt auth response: {error}")))?;
        parsed
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| QueryError::new("mrkt auth response carried no token"))
    }

    fn payload(&self, query: &GiftQuery, with_background: bool) -> String {
        let backdrops: Vec<&str> = if with_background && !query.background.is_empty() {
            vec![query.background.as_str()]
        } else {
            Vec::new()
        };

        serde_json::json!({
            "count": 1,
            "cursor": "",
            "collectionNames": [query.collection],
            "modelNames": [query.variant],
            "backdropNames": backdrops,
            "symbolNames": [],
            "number": null,
            "isNew": null,
            "isPremarket": null,
            "minPrice": null,
            "maxPrice": null,
            "ordering": "Price",
            "lowToHigh": true,
            "query": null,
        })
        .to_string()
    }

    async fn lowest_ask(
        &self,
        auth: &HttpAuth,
        query: &GiftQuery,
        with_background: bool,
    ) -> PriceQuote {
        let url = format!("{}/gifts/saling", self.settings.api_url);
        let payload = self.payload(query, with_background);

        let outcome = self
            .retry
            .run("mrkt search", || {
                let request = HttpRequest::post(url.clone())
                    .with_json_body(payload.clone())
                    .with_auth(auth)
                    .with_timeout(self.settings.timeout);
                async move {
                    let response = self.http.execute(request).await?;
                    if !response.is_success() {
                        return Err(QueryError::new(format!(
                            "mrkt search returned status {}",
                            response.status
                        )));
                    }
                    let parsed: SalingResponse =
                        serde_json::from_str(&response.body).map_err(|error| {
                            QueryError::new(format!("malformed mrkt search response: {error}"))
                        })?;

                    // The query is sorted cheapest-first with count=1, so the
                    // head of the list is the floor.
                    match parsed.gifts.first() {
                        Some(gift) => gift
                            .sale_price
                            .map(Some)
                            .ok_or_else(|| QueryError::new("mrkt listing carried no salePrice")),
                        None => Ok(None),
                    }
                }
            })
            .await;

        match outcome {
            Ok(lowest) => PriceQuote::from_lowest(lowest),
            Err(_) => PriceQuote::Failed,
        }
    }
}

impl Marketplace for MrktMarketplace {
    fn id(&self) -> MarketplaceId {
        MarketplaceId::Mrkt
    }

    fn prices<'a>(
        &'a self,
        query: &'a GiftQuery,
    ) -> Pin<Box<dyn Future<Output = MarketPrices> + Send + 'a>> {
        Box::pin(self.fetch(query))
    }
}
