use giftfloor_core::GiftIdentity;

use crate::cli::PriceArgs;
use crate::error::CliError;
use crate::output::{GiftView, MarketView, PriceReport, Report};

use super::AppContext;

pub async fn run(args: &PriceArgs, context: &AppContext) -> Result<Report, CliError> {
    let variant = args
        .variant
        .as_deref()
        .map(str::trim)
        .filter(|variant| !variant.is_empty())
        .ok_or_else(|| {
            CliError::Command(String::from(
                "a gift without a variant is not a priceable collectible; pass --variant",
            ))
        })?;

    let gift = GiftIdentity {
        collection: args.collection.clone(),
        variant: Some(variant.to_owned()),
        variant_percent: args.variant_percent.clone(),
        background: args.background.clone(),
        background_percent: args.background_percent.clone(),
    };

    tracing::info!(
        collection = gift.collection.as_str(),
        variant,
        "aggregating floor prices"
    );

    // Marketplaces and exchange rates have no data dependency on each other,
    // so both fan-outs run at once.
    let (report, rates) = tokio::join!(context.aggregator.fetch_all(&gift), context.rates.rates());
    let report = report?;

    let markets = report
        .into_iter()
        .map(|(id, prices)| MarketView::new(id, prices, rates))
        .collect();

    Ok(Report::Price(PriceReport {
        gift: GiftView {
            collection: gift.collection.trim().to_owned(),
            variant: variant.to_owned(),
            background: gift
                .background
                .as_deref()
                .map(str::trim)
                .filter(|background| !background.is_empty())
                .map(str::to_owned),
        },
        rates: rates.into(),
        markets,
    }))
}
