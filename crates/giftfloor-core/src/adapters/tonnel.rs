//! Tonnel marketplace adapter.
//!
//! Tonnel is queried anonymously through its page-gifts endpoint with a
//! MongoDB-style filter document serialized as a JSON string inside the JSON
//! payload. Unlike the other marketplaces it filters on the labeled facet
//! forms ("Name (percent)") for both variant and backdrop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::TonnelSettings;
use crate::gift::GiftQuery;
use crate::http::{HttpClient, HttpRequest};
use crate::market::{MarketPrices, Marketplace, MarketplaceId, PriceQuote, QueryError};
use crate::retry::RetryPolicy;

pub struct TonnelMarketplace {
    http: Arc<dyn HttpClient>,
    settings: TonnelSettings,
    retry: RetryPolicy,
}

/// The endpoint answers a listing query with a JSON array; any other shape
/// (typically an error object) means no listings matched.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TonnelResponse {
    Listings(Vec<TonnelListing>),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct TonnelListing {
    #[serde(default)]
    price: Option<f64>,
}

impl TonnelMarketplace {
    pub fn new(http: Arc<dyn HttpClient>, settings: TonnelSettings, retry: RetryPolicy) -> Self {
        Self {
            http,
            settings,
            retry,
        }
    }

    async fn fetch(&self, query: &GiftQuery) -> MarketPrices {
        let (simple, detailed) = tokio::join!(
            self.lowest_ask(query, false),
            self.lowest_ask(query, true),
        );
        MarketPrices::new(simple, detailed)
    }

    fn filter_document(&self, query: &GiftQuery, with_background: bool) -> String {
        let mut filter = serde_json::json!({
            "price": {"$exists": true},
            "buyer": {"$exists": false},
            "gift_name": query.collection,
            "model": query.variant_labeled,
            "asset": "TON",
        });
        if with_background && !query.background_labeled.is_empty() {
            filter["backdrop"] = serde_json::json!({"$in": [query.background_labeled]});
        }
        filter.to_string()
    }

    fn payload(&self, query: &GiftQuery, with_background: bool) -> String {
        serde_json::json!({
            "page": 1,
            "limit": 30,
            "sort": "{\"price\":1,\"gift_id\":-1}",
            "ref": 0,
            "price_range": null,
            "user_auth": "",
            "filter": self.filter_document(query, with_background),
        })
        .to_string()
    }

    async fn lowest_ask(&self, query: &GiftQuery, with_background: bool) -> PriceQuote {
        let payload = self.payload(query, with_background);

        let outcome = self
            .retry
            .run("tonnel search", || {
                let request = HttpRequest::post(&self.settings.api_url)
                    .with_header("accept", "application/json")
                    .with_header("accept-language", "en-US,en;q=0.9")
                    .with_header("cache-control", "no-cache")
                    .with_header("origin", &self.settings.origin)
                    .with_header("referer", &self.settings.referer)
                    .with_json_body(payload.clone())
                    .with_timeout(self.settings.timeout);
                async move {
                    let response = self.http.execute(request).await?;
                    if !response.is_success() {
                        return Err(QueryError::new(format!(
                            "tonnel search returned status {}",
                            response.status
                        )));
                    }
                    let parsed: TonnelResponse =
                        serde_json::from_str(&response.body).map_err(|error| {
                            QueryError::new(format!("malformed tonnel response: {error}"))
                        })?;
                    let lowest = match parsed {
                        TonnelResponse::Listings(listings) => listings
                            .iter()
                            .filter_map(|listing| listing.price)
                            .reduce(f64::min),
                        TonnelResponse::Other(_) => None,
                    };
                    Ok(lowest)
                }
            })
            .await;

        match outcome {
            Ok(lowest) => PriceQuote::from_lowest(lowest),
            Err(_) => PriceQuote::Failed,
        }
    }
}

impl Marketplace for TonnelMarketplace {
    fn id(&self) -> MarketplaceId {
        MarketplaceId::Tonnel
    }

    fn prices<'a>(
        &'a self,
        query: &'a GiftQuery,
    ) -> Pin<Box<dyn Future<Output = MarketPrices> + Send + 'a>> {
        Box::pin(self.fetch(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gift::GiftIdentity;
    use crate::http::{HttpError, HttpResponse};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Returns the same canned response for every request and records the
    /// request bodies it saw.
    struct CannedHttpClient {
        response: Result<HttpResponse, HttpError>,
        bodies: Mutex<Vec<String>>,
    }

    impl CannedHttpClient {
        fn new(response: Result<HttpResponse, HttpError>) -> Self {
            Self {
                response,
                bodies: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpClient for CannedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            Box::pin(async move {
                if let Some(body) = request.body {
                    self.bodies.lock().expect("bodies lock").push(body);
                }
                self.response.clone()
            })
        }
    }

    fn query() -> GiftQuery {
        GiftQuery::new(&GiftIdentity {
            collection: String::from("Desk Calendar"),
            variant: Some(String::from("Dark Mode")),
            variant_percent: Some(String::from("1.5%")),
            background: Some(String::from("Deep Space")),
            background_percent: Some(String::from("2%")),
        })
        .expect("valid identity")
    }

    fn marketplace(http: Arc<dyn HttpClient>) -> TonnelMarketplace {
        TonnelMarketplace::new(
            http,
            TonnelSettings::default(),
            RetryPolicy::new(3, Duration::ZERO),
        )
    }

    #[test]
    fn filter_uses_labeled_variant_and_optional_background() {
        let marketplace = marketplace(Arc::new(crate::http::NoopHttpClient));
        let simple: serde_json::Value =
            serde_json::from_str(&marketplace.filter_document(&query(), false)).expect("json");
        let detailed: serde_json::Value =
            serde_json::from_str(&marketplace.filter_document(&query(), true)).expect("json");

        assert_eq!(simple["model"], "Dark Mode (1.5%)");
        assert_eq!(simple["gift_name"], "Desk Calendar");
        assert_eq!(simple["asset"], "TON");
        assert!(simple.get("backdrop").is_none());
        assert_eq!(detailed["backdrop"]["$in"][0], "Deep Space (2%)");
    }

    #[test]
    fn backdrop_filter_requires_the_labeled_form() {
        let marketplace = marketplace(Arc::new(crate::http::NoopHttpClient));
        let mut gift = GiftIdentity {
            collection: String::from("Desk Calendar"),
            variant: Some(String::from("Dark Mode")),
            variant_percent: Some(String::from("1.5%")),
            background: Some(String::from("Deep Space")),
            background_percent: None,
        };
        let query = GiftQuery::new(&gift).expect("valid identity");

        // Without a rarity percent there is no labeled backdrop to filter on.
        let detailed: serde_json::Value =
            serde_json::from_str(&marketplace.filter_document(&query, true)).expect("json");
        assert!(detailed.get("backdrop").is_none());

        gift.background_percent = Some(String::from("2%"));
        let query = GiftQuery::new(&gift).expect("valid identity");
        let detailed: serde_json::Value =
            serde_json::from_str(&marketplace.filter_document(&query, true)).expect("json");
        assert_eq!(detailed["backdrop"]["$in"][0], "Deep Space (2%)");
    }

    #[tokio::test]
    async fn picks_the_cheapest_listing() {
        let body = r#"[{"price": 5.2}, {"price": 3.1}, {"price": 9.0}]"#;
        let http = Arc::new(CannedHttpClient::new(Ok(HttpResponse::ok_json(body))));
        let prices = marketplace(http).fetch(&query()).await;

        assert_eq!(prices.simple, PriceQuote::Listed(3.1));
        assert_eq!(prices.detailed, PriceQuote::Listed(3.1));
    }

    #[tokio::test]
    async fn non_array_response_means_unlisted() {
        let http = Arc::new(CannedHttpClient::new(Ok(HttpResponse::ok_json(
            r#"{"message": "nothing here"}"#,
        ))));
        let prices = marketplace(http).fetch(&query()).await;

        assert_eq!(prices.simple, PriceQuote::Unlisted);
        assert_eq!(prices.detailed, PriceQuote::Unlisted);
    }

    #[tokio::test]
    async fn transport_failure_exhausts_retries_and_fails() {
        let http = Arc::new(CannedHttpClient::new(Err(HttpError::new("refused"))));
        let prices = marketplace(http.clone()).fetch(&query()).await;

        assert_eq!(prices.simple, PriceQuote::Failed);
        assert_eq!(prices.detailed, PriceQuote::Failed);
        // 3 attempts for each of the two concurrent queries.
        assert_eq!(http.bodies.lock().expect("bodies lock").len(), 6);
    }
}
