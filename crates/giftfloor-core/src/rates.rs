//! Exchange-rate resolution: TON→USD via tonapi, USDT→IRR via nobitex.
//!
//! The two upstreams are fetched concurrently and cached together under one
//! TTL. A fetch that produced at least one rate is cached as-is; a fetch that
//! produced neither is never cached, so the next caller retries immediately
//! instead of serving a cached double failure for a full TTL window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::config::RateSettings;
use crate::http::{HttpClient, HttpRequest};

/// Snapshot of both exchange rates; either side may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExchangeRates {
    /// USD per TON.
    pub ton_to_usd: Option<f64>,
    /// IRR (rial) per USDT.
    pub usdt_to_irr: Option<f64>,
}

impl ExchangeRates {
    pub const fn is_empty(&self) -> bool {
        self.ton_to_usd.is_none() && self.usdt_to_irr.is_none()
    }

    /// Converts a TON amount to USD, rounded to cents.
    pub fn convert_ton_to_usd(&self, amount_ton: f64) -> Option<f64> {
        let rate = self.ton_to_usd?;
        Some((amount_ton * rate * 100.0).round() / 100.0)
    }

    /// Converts a USD amount to toman (IRR / 10), truncated to a whole
    /// toman. USDT is treated as 1:1 with USD.
    pub fn convert_usd_to_toman(&self, amount_usd: f64) -> Option<i64> {
        let rate = self.usdt_to_irr?;
        Some((amount_usd * rate / 10.0) as i64)
    }
}

/// Formats a toman amount with Persian thousands separators.
pub fn format_toman(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('٬');
        }
        grouped.push(digit);
    }
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[derive(Debug, Deserialize)]
struct TonApiResponse {
    rates: HashMap<String, TonApiToken>,
}

#[derive(Debug, Deserialize)]
struct TonApiToken {
    prices: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct NobitexResponse {
    stats: HashMap<String, NobitexStat>,
}

#[derive(Debug, Deserialize)]
struct NobitexStat {
    /// Nobitex serializes the latest trade price as a string.
    latest: serde_json::Value,
}

impl NobitexStat {
    fn latest_price(&self) -> Option<f64> {
        match &self.latest {
            serde_json::Value::Number(number) => number.as_f64(),
            serde_json::Value::String(text) => text.parse().ok(),
            _ => None,
        }
    }
}

struct CachedRates {
    rates: ExchangeRates,
    fetched_at: Instant,
}

/// Fetches and caches the exchange-rate pair.
pub struct RateResolver {
    http: Arc<dyn HttpClient>,
    settings: RateSettings,
    cache: tokio::sync::Mutex<Option<CachedRates>>,
}

impl RateResolver {
    pub fn new(http: Arc<dyn HttpClient>, settings: RateSettings) -> Self {
        Self {
            http,
            settings,
            cache: tokio::sync::Mutex::new(None),
        }
    }

    /// Returns the current rate pair, fetching when the cache is cold or
    /// stale. The cache lock is held across the fetch, so concurrent callers
    /// in one TTL window share a single upstream round trip.
    pub async fn rates(&self) -> ExchangeRates {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < self.settings.ttl {
                return cached.rates;
            }
        }

        let rates = self.fetch_pair().await;
        if rates.is_empty() {
            tracing::error!("both exchange-rate sources failed, leaving cache unset");
            cache.take();
        } else {
            *cache = Some(CachedRates {
                rates,
                fetched_at: Instant::now(),
            });
        }
        rates
    }

    /// Fetches both rates concurrently, retrying only when the whole pair
    /// failed. A partial result is accepted as final.
    async fn fetch_pair(&self) -> ExchangeRates {
        let attempts = self.settings.attempts.max(1);

        for attempt in 1..=attempts {
            let (ton_to_usd, usdt_to_irr) =
                tokio::join!(self.fetch_ton_usd(), self.fetch_usdt_irr());
            let rates = ExchangeRates {
                ton_to_usd,
                usdt_to_irr,
            };
            if !rates.is_empty() {
                return rates;
            }
            if attempt < attempts {
                tracing::warn!(attempt, attempts, "both rate fetches failed, retrying");
                tokio::time::sleep(self.settings.delay).await;
            }
        }

        ExchangeRates::default()
    }

    async fn fetch_ton_usd(&self) -> Option<f64> {
        let request = HttpRequest::get(self.settings.ton_usd_url.clone())
            .with_timeout(self.settings.timeout);

        let response = match self.http.execute(request).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                tracing::error!(status = response.status, "ton rate source returned an error status");
                return None;
            }
            Err(error) => {
                tracing::error!(%error, "ton rate fetch failed");
                return None;
            }
        };

        let parsed: TonApiResponse = match serde_json::from_str(&response.body) {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::error!(%error, "malformed ton rate response");
                return None;
            }
        };

        parsed
            .rates
            .get("TON")
            .and_then(|token| token.prices.get("USD"))
            .copied()
    }

    async fn fetch_usdt_irr(&self) -> Option<f64> {
        let request = HttpRequest::get(self.settings.usdt_irr_url.clone())
            .with_timeout(self.settings.timeout);

        let response = match self.http.execute(request).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                tracing::error!(status = response.status, "fiat rate source returned an error status");
                return None;
            }
            Err(error) => {
                tracing::error!(%error, "fiat rate fetch failed");
                return None;
            }
        };

        let parsed: NobitexResponse = match serde_json::from_str(&response.body) {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::error!(%error, "malformed fiat rate response");
                return None;
            }
        };

        parsed
            .stats
            .get("usdt-rls")
            .and_then(NobitexStat::latest_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpError, HttpResponse};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    const TONAPI_BODY: &str = r#"{"rates": {"TON": {"prices": {"USD": 5.0}}}}"#;
    const NOBITEX_BODY: &str = r#"{"stats": {"usdt-rls": {"latest": "600000"}}}"#;

    /// Routes by URL substring, counting hits.
    struct RateHttpClient {
        ton: Result<HttpResponse, HttpError>,
        fiat: Result<HttpResponse, HttpError>,
        hits: AtomicU32,
    }

    impl RateHttpClient {
        fn new(ton: Result<HttpResponse, HttpError>, fiat: Result<HttpResponse, HttpError>) -> Self {
            Self {
                ton,
                fiat,
                hits: AtomicU32::new(0),
            }
        }
    }

    impl HttpClient for RateHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            Box::pin(async move {
                self.hits.fetch_add(1, Ordering::SeqCst);
                if request.url.contains("tonapi") {
                    self.ton.clone()
                } else {
                    self.fiat.clone()
                }
            })
        }
    }

    fn settings() -> RateSettings {
        RateSettings {
            delay: Duration::ZERO,
            ..RateSettings::default()
        }
    }

    #[tokio::test]
    async fn fetches_both_rates_and_serves_the_second_call_from_cache() {
        let http = Arc::new(RateHttpClient::new(
            Ok(HttpResponse::ok_json(TONAPI_BODY)),
            Ok(HttpResponse::ok_json(NOBITEX_BODY)),
        ));
        let resolver = RateResolver::new(http.clone(), settings());

        let rates = resolver.rates().await;
        assert_eq!(rates.ton_to_usd, Some(5.0));
        assert_eq!(rates.usdt_to_irr, Some(600_000.0));
        assert_eq!(http.hits.load(Ordering::SeqCst), 2);

        let again = resolver.rates().await;
        assert_eq!(again, rates);
        assert_eq!(http.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn partial_failure_is_cached_without_a_retry() {
        let http = Arc::new(RateHttpClient::new(
            Ok(HttpResponse::ok_json(TONAPI_BODY)),
            Err(HttpError::new("refused")),
        ));
        let resolver = RateResolver::new(http.clone(), settings());

        let rates = resolver.rates().await;
        assert_eq!(rates.ton_to_usd, Some(5.0));
        assert_eq!(rates.usdt_to_irr, None);
        assert_eq!(http.hits.load(Ordering::SeqCst), 2);

        resolver.rates().await;
        assert_eq!(http.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn total_failure_retries_and_is_never_cached() {
        let http = Arc::new(RateHttpClient::new(
            Err(HttpError::new("refused")),
            Err(HttpError::new("refused")),
        ));
        let resolver = RateResolver::new(http.clone(), settings());

        let rates = resolver.rates().await;
        assert!(rates.is_empty());
        // Two sources, two attempts each.
        assert_eq!(http.hits.load(Ordering::SeqCst), 4);

        // A later call fetches again instead of serving the failure.
        resolver.rates().await;
        assert_eq!(http.hits.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn conversions_round_to_display_precision() {
        let rates = ExchangeRates {
            ton_to_usd: Some(5.333),
            usdt_to_irr: Some(600_000.0),
        };

        assert_eq!(rates.convert_ton_to_usd(3.1), Some(16.53));
        assert_eq!(rates.convert_usd_to_toman(16.53), Some(991_800));
        assert_eq!(ExchangeRates::default().convert_ton_to_usd(3.1), None);
    }

    #[test]
    fn toman_conversion_truncates_fractional_amounts() {
        let rates = ExchangeRates {
            ton_to_usd: Some(5.0),
            usdt_to_irr: Some(999_000.0),
        };

        // 0.025 * 999000 / 10 = 2497.5 toman; fractions are dropped, not
        // rounded up.
        assert_eq!(rates.convert_usd_to_toman(0.025), Some(2_497));
    }

    #[test]
    fn toman_amounts_group_with_persian_separators() {
        assert_eq!(format_toman(991_800), "991٬800");
        assert_eq!(format_toman(1_234_567), "1٬234٬567");
        assert_eq!(format_toman(42), "42");
        assert_eq!(format_toman(0), "0");
    }
}
