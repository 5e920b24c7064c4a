//! Engine configuration: environment-backed with production defaults.
//!
//! Endpoints, identities, and timing constants are configuration, not
//! protocol; everything here can be overridden with a `GIFTFLOOR_*`
//! environment variable.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::http::HttpConfig;
use crate::retry::RetryPolicy;

/// Session layer settings shared by both authenticated marketplaces.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Local web-view gateway that holds the durable messenger logins.
    pub gateway_url: String,
    /// Directory containing `<identity>.json` credential files written by
    /// the offline provisioning flow.
    pub credentials_dir: PathBuf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            gateway_url: String::from("http://127.0.0.1:8787"),
            credentials_dir: PathBuf::from("sessions"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PortalsSettings {
    pub api_url: String,
    pub identity: String,
    pub bot: String,
    pub app_short_name: String,
    pub platform: String,
    pub timeout: Duration,
}

impl Default for PortalsSettings {
    fn default() -> Self {
        Self {
            api_url: String::from("https://portal-market.com/api"),
            identity: String::from("portals"),
            bot: String::from("portals"),
            app_short_name: String::from("market"),
            platform: String::from("android"),
            timeout: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TonnelSettings {
    pub api_url: String,
    pub origin: String,
    pub referer: String,
    pub timeout: Duration,
}

impl Default for TonnelSettings {
    fn default() -> Self {
        Self {
            api_url: String::from("https://gifts3.tonnel.network/api/pageGifts"),
            origin: String::from("https://market.tonnel.network"),
            referer: String::from("https://market.tonnel.network/"),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MrktSettings {
    pub api_url: String,
    pub identity: String,
    pub bot: String,
    pub app_short_name: String,
    pub platform: String,
    pub auth_timeout: Duration,
    pub timeout: Duration,
}

impl Default for MrktSettings {
    fn default() -> Self {
        Self {
            api_url: String::from("https://api.tgmrkt.io/api/v1"),
            identity: String::from("mrkt"),
            bot: String::from("mrkt"),
            app_short_name: String::from("app"),
            platform: String::from("android"),
            auth_timeout: Duration::from_secs(12),
            timeout: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateSettings {
    pub ton_usd_url: String,
    pub usdt_irr_url: String,
    pub ttl: Duration,
    pub attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            ton_usd_url: String::from("https://tonapi.io/v2/rates?tokens=ton&currencies=usd"),
            usdt_irr_url: String::from("https://apiv2.nobitex.ir/market/stats?srcCurrency=usdt"),
            ttl: Duration::from_secs(60),
            attempts: 2,
            delay: Duration::from_secs(2),
            timeout: Duration::from_secs(6),
        }
    }
}

/// Top-level engine settings.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub http: HttpConfig,
    pub retry: RetryPolicy,
    pub session: SessionSettings,
    pub portals: PortalsSettings,
    pub tonnel: TonnelSettings,
    pub mrkt: MrktSettings,
    pub rates: RateSettings,
}

impl Settings {
    /// Builds settings from the environment, falling back to the production
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Some(url) = env_string("GIFTFLOOR_WEBVIEW_GATEWAY") {
            settings.session.gateway_url = url;
        }
        if let Some(dir) = env_string("GIFTFLOOR_SESSIONS_DIR") {
            settings.session.credentials_dir = PathBuf::from(dir);
        }
        if let Some(url) = env_string("GIFTFLOOR_PORTALS_API_URL") {
            settings.portals.api_url = url;
        }
        if let Some(url) = env_string("GIFTFLOOR_TONNEL_API_URL") {
            settings.tonnel.api_url = url;
        }
        if let Some(url) = env_string("GIFTFLOOR_MRKT_API_URL") {
            settings.mrkt.api_url = url;
        }
        if let Some(url) = env_string("GIFTFLOOR_TON_RATE_URL") {
            settings.rates.ton_usd_url = url;
        }
        if let Some(url) = env_string("GIFTFLOOR_FIAT_RATE_URL") {
            settings.rates.usdt_irr_url = url;
        }
        if let Some(ttl) = env_secs("GIFTFLOOR_RATE_TTL_SECS") {
            settings.rates.ttl = ttl;
        }
        if let Some(delay) = env_secs("GIFTFLOOR_RETRY_DELAY_SECS") {
            settings.retry.delay = delay;
        }

        settings
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_string(key)?.parse::<u64>().ok().map(Duration::from_secs)
}
