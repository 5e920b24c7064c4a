//! Fan-out aggregation across all configured marketplaces.

use std::sync::Arc;

use crate::gift::{GiftIdentity, GiftQuery, GiftQueryError};
use crate::market::{MarketPrices, Marketplace, MarketplaceId};

/// Runs every configured marketplace concurrently and merges the outcomes
/// into one report.
///
/// Marketplace isolation is total: a panic or failure inside one adapter
/// degrades only that marketplace's entry, never the whole report.
pub struct Aggregator {
    marketplaces: Vec<Arc<dyn Marketplace>>,
}

impl Aggregator {
    pub fn new(marketplaces: Vec<Arc<dyn Marketplace>>) -> Self {
        Self { marketplaces }
    }

    /// Fetches both price quotes from every marketplace for one gift.
    ///
    /// Entries come back in configured marketplace order regardless of
    /// completion order. The only escaping error is identity validation;
    /// everything downstream of a valid query lands in a [`MarketPrices`]
    /// state.
    pub async fn fetch_all(
        &self,
        gift: &GiftIdentity,
    ) -> Result<Vec<(MarketplaceId, MarketPrices)>, GiftQueryError> {
        let query = Arc::new(GiftQuery::new(gift)?);

        let handles: Vec<_> = self
            .marketplaces
            .iter()
            .map(|marketplace| {
                let marketplace = marketplace.clone();
                let query = query.clone();
                let id = marketplace.id();
                let handle =
                    tokio::spawn(async move { marketplace.prices(&query).await });
                (id, handle)
            })
            .collect();

        let mut report = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let prices = match handle.await {
                Ok(prices) => prices,
                Err(error) => {
                    tracing::error!(marketplace = %id, %error, "marketplace task aborted");
                    MarketPrices::failed()
                }
            };
            report.push((id, prices));
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::PriceQuote;
    use std::future::Future;
    use std::pin::Pin;

    struct FixedMarketplace {
        id: MarketplaceId,
        prices: MarketPrices,
    }

    impl Marketplace for FixedMarketplace {
        fn id(&self) -> MarketplaceId {
            self.id
        }

        fn prices<'a>(
            &'a self,
            _query: &'a GiftQuery,
        ) -> Pin<Box<dyn Future<Output = MarketPrices> + Send + 'a>> {
            let prices = self.prices;
            Box::pin(async move { prices })
        }
    }

    struct PanickingMarketplace;

    impl Marketplace for PanickingMarketplace {
        fn id(&self) -> MarketplaceId {
            MarketplaceId::Portals
        }

        fn prices<'a>(
            &'a self,
            _query: &'a GiftQuery,
        ) -> Pin<Box<dyn Future<Output = MarketPrices> + Send + 'a>> {
            Box::pin(async move { panic!("adapter bug") })
        }
    }

    fn gift() -> GiftIdentity {
        GiftIdentity {
            collection: String::from("Desk Calendar"),
            variant: Some(String::from("Gold")),
            ..GiftIdentity::default()
        }
    }

    #[tokio::test]
    async fn merges_outcomes_in_configured_order() {
        let aggregator = Aggregator::new(vec![
            Arc::new(FixedMarketplace {
                id: MarketplaceId::Tonnel,
                prices: MarketPrices::new(PriceQuote::Listed(3.1), PriceQuote::Listed(4.5)),
            }),
            Arc::new(FixedMarketplace {
                id: MarketplaceId::Mrkt,
                prices: MarketPrices::unlisted(),
            }),
        ]);

        let report = aggregator.fetch_all(&gift()).await.expect("valid gift");

        assert_eq!(report.len(), 2);
        assert_eq!(report[0].0, MarketplaceId::Tonnel);
        assert_eq!(report[0].1.simple, PriceQuote::Listed(3.1));
        assert_eq!(report[1].0, MarketplaceId::Mrkt);
        assert_eq!(report[1].1, MarketPrices::unlisted());
    }

    #[tokio::test]
    async fn panicking_marketplace_degrades_to_failed_without_poisoning_others() {
        let aggregator = Aggregator::new(vec![
            Arc::new(PanickingMarketplace),
            Arc::new(FixedMarketplace {
                id: MarketplaceId::Tonnel,
                prices: MarketPrices::new(PriceQuote::Listed(5.2), PriceQuote::Unlisted),
            }),
        ]);

        let report = aggregator.fetch_all(&gift()).await.expect("valid gift");

        assert_eq!(report[0], (MarketplaceId::Portals, MarketPrices::failed()));
        assert_eq!(report[1].1.simple, PriceQuote::Listed(5.2));
    }

    #[tokio::test]
    async fn invalid_identity_is_rejected_before_any_fetch() {
        let aggregator = Aggregator::new(Vec::new());
        let gift = GiftIdentity::default();

        assert_eq!(
            aggregator.fetch_all(&gift).await,
            Err(GiftQueryError::EmptyCollection)
        );
    }
}
