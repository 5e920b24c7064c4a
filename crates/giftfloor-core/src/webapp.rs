//! Web-app auth bridge: mints short-lived mini-app init-data via a cached
//! marketplace session.
//!
//! Init-data is never cached; every fetch invocation re-derives it, trading
//! one extra round trip for freedom from stale-token failures.

use crate::session::SessionManager;

const INIT_DATA_MARKER: &str = "tgWebAppData=";
const INIT_DATA_TERMINATOR: &str = "&tgWebAppVersion";

/// Resolves the session for `identity`, requests a web-app view scoped to the
/// named mini-app, and extracts the decoded init-data payload from the
/// returned URL.
///
/// Every failure path collapses to `None` after logging its cause; callers
/// treat all of them identically.
pub async fn webapp_init_data(
    sessions: &SessionManager,
    identity: &str,
    bot: &str,
    app_short_name: &str,
    platform: &str,
) -> Option<String> {
    let session = match sessions.get(identity).await {
        Ok(session) => session,
        Err(error) => {
            tracing::error!(identity, %error, "could not obtain a marketplace session");
            return None;
        }
    };

    let url = match session.request_web_view(bot, app_short_name, platform).await {
        Ok(url) => url,
        Err(error) => {
            tracing::error!(identity, bot, %error, "web-app view request failed");
            return None;
        }
    };

    match extract_init_data(&url) {
        Some(init_data) => Some(init_data),
        None => {
            tracing::error!(identity, bot, "web-view URL carried no init-data payload");
            None
        }
    }
}

/// Pulls the payload between `tgWebAppData=` and `&tgWebAppVersion` out of a
/// web-view URL and percent-decodes it.
pub fn extract_init_data(url: &str) -> Option<String> {
    let (_, tail) = url.split_once(INIT_DATA_MARKER)?;
    let raw = match tail.split_once(INIT_DATA_TERMINATOR) {
        Some((payload, _)) => payload,
        None => tail,
    };
    urlencoding::decode(raw).ok().map(|decoded| decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_decodes_the_payload() {
        let url = "https://web.example/app#tgWebAppData=query_id%3DAAE%26user%3D%257B%257D&tgWebAppVersion=7.0&tgWebAppPlatform=android";

        assert_eq!(
            extract_init_data(url).as_deref(),
            Some("query_id=AAE&user=%7B%7D")
        );
    }

    #[test]
    fn payload_without_terminator_runs_to_the_end() {
        let url = "https://web.example/app#tgWebAppData=query_id%3DAAE";
        assert_eq!(extract_init_data(url).as_deref(), Some("query_id=AAE"));
    }

    #[test]
    fn missing_marker_yields_none() {
        assert_eq!(extract_init_data("https://web.example/app#foo=bar"), None);
    }
}
