//! Report views and rendering.
//!
//! Every command produces a [`Report`]; rendering serializes it as JSON or
//! formats it as terminal text. Quote views carry the tri-state outcome
//! explicitly so "not listed" and "marketplace failed" never collapse into
//! one another.

use std::io::Write;

use serde::Serialize;

use giftfloor_core::{format_toman, ExchangeRates, MarketPrices, MarketplaceId, PriceQuote};

use crate::cli::OutputFormat;
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Report {
    Price(PriceReport),
    Rates(RatesView),
}

#[derive(Debug, Serialize)]
pub struct PriceReport {
    pub gift: GiftView,
    pub rates: RatesView,
    pub markets: Vec<MarketView>,
}

#[derive(Debug, Serialize)]
pub struct GiftView {
    pub collection: String,
    pub variant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RatesView {
    pub ton_to_usd: Option<f64>,
    pub usdt_to_irr: Option<f64>,
}

impl From<ExchangeRates> for RatesView {
    fn from(rates: ExchangeRates) -> Self {
        Self {
            ton_to_usd: rates.ton_to_usd,
            usdt_to_irr: rates.usdt_to_irr,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MarketView {
    pub market: String,
    /// Variant-only floor.
    pub variant: QuoteView,
    /// Variant-plus-background floor.
    pub with_background: QuoteView,
}

impl MarketView {
    pub fn new(id: MarketplaceId, prices: MarketPrices, rates: ExchangeRates) -> Self {
        Self {
            market: id.as_str().to_owned(),
            variant: QuoteView::new(prices.simple, id, rates),
            with_background: QuoteView::new(prices.detailed, id, rates),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuoteView {
    Listed {
        price_ton: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        price_usd: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        price_toman: Option<String>,
    },
    Unlisted,
    Error,
}

impl QuoteView {
    pub fn new(quote: PriceQuote, id: MarketplaceId, rates: ExchangeRates) -> Self {
        match quote {
            PriceQuote::Listed(native) => {
                let price_ton = id.price_unit().to_ton(native);
                let price_usd = rates.convert_ton_to_usd(price_ton);
                let price_toman = price_usd
                    .and_then(|usd| rates.convert_usd_to_toman(usd))
                    .map(format_toman);
                Self::Listed {
                    price_ton,
                    price_usd,
                    price_toman,
                }
            }
            PriceQuote::Unlisted => Self::Unlisted,
            PriceQuote::Failed => Self::Error,
        }
    }

    fn as_text(&self) -> String {
        match self {
            Self::Listed {
                price_ton,
                price_usd,
                price_toman,
            } => {
                let mut text = format!("{price_ton:.2} TON");
                if let Some(usd) = price_usd {
                    text.push_str(&format!(" (${usd:.2}"));
                    if let Some(toman) = price_toman {
                        text.push_str(&format!(" / {toman} toman"));
                    }
                    text.push(')');
                }
                text
            }
            Self::Unlisted => String::from("not listed"),
            Self::Error => String::from("error"),
        }
    }
}

pub fn render(report: &Report, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => render_json(report, pretty),
        OutputFormat::Text => render_text(report),
    }
}

fn render_json(report: &Report, pretty: bool) -> Result<(), CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}")?;
    Ok(())
}

fn render_text(report: &Report) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();

    match report {
        Report::Price(price) => {
            let mut header = format!("{} / {}", price.gift.collection, price.gift.variant);
            if let Some(background) = &price.gift.background {
                header.push_str(&format!(" on {background}"));
            }
            writeln!(stdout, "{header}")?;
            writeln!(stdout, "{}", rates_line(&price.rates))?;

            for market in &price.markets {
                writeln!(
                    stdout,
                    "  {:<8} variant: {:<40} +background: {}",
                    market.market,
                    market.variant.as_text(),
                    market.with_background.as_text(),
                )?;
            }
        }
        Report::Rates(rates) => {
            writeln!(stdout, "{}", rates_line(rates))?;
        }
    }

    Ok(())
}

fn rates_line(rates: &RatesView) -> String {
    let ton = match rates.ton_to_usd {
        Some(rate) => format!("{rate:.2}"),
        None => String::from("unavailable"),
    };
    let irr = match rates.usdt_to_irr {
        Some(rate) => format!("{rate:.0}"),
        None => String::from("unavailable"),
    };
    format!("TON→USD {ton}, USDT→IRR {irr}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> ExchangeRates {
        ExchangeRates {
            ton_to_usd: Some(5.0),
            usdt_to_irr: Some(600_000.0),
        }
    }

    #[test]
    fn listed_quote_converts_nano_ton_and_currencies() {
        let view = QuoteView::new(
            PriceQuote::Listed(3_100_000_000.0),
            MarketplaceId::Mrkt,
            rates(),
        );

        match view {
            QuoteView::Listed {
                price_ton,
                price_usd,
                price_toman,
            } => {
                assert_eq!(price_ton, 3.1);
                assert_eq!(price_usd, Some(15.5));
                assert_eq!(price_toman.as_deref(), Some("930٬000"));
            }
            other => panic!("expected a listed quote, got {other:?}"),
        }
    }

    #[test]
    fn failed_and_unlisted_quotes_stay_distinct_in_json() {
        let unlisted = serde_json::to_value(QuoteView::new(
            PriceQuote::Unlisted,
            MarketplaceId::Tonnel,
            rates(),
        ))
        .expect("serializes");
        let failed = serde_json::to_value(QuoteView::new(
            PriceQuote::Failed,
            MarketplaceId::Tonnel,
            rates(),
        ))
        .expect("serializes");

        assert_eq!(unlisted["status"], "unlisted");
        assert_eq!(failed["status"], "error");
    }

    #[test]
    fn missing_rates_drop_the_converted_fields() {
        let view = QuoteView::new(
            PriceQuote::Listed(3.1),
            MarketplaceId::Tonnel,
            ExchangeRates::default(),
        );
        let value = serde_json::to_value(&view).expect("serializes");

        assert_eq!(value["price_ton"], 3.1);
        assert!(value.get("price_usd").is_none());
        assert!(value.get("price_toman").is_none());
    }
}
