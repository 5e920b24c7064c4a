//! Long-lived marketplace session handles and their creation lifecycle.
//!
//! Sessions are opaque authenticated client handles keyed by marketplace
//! identity ("portals", "mrkt"). The [`SessionManager`] owns the cache;
//! fetchers borrow a handle for the duration of one call and never close it.
//! Per-identity locks guarantee at most one in-flight connect per identity,
//! so concurrent callers during a cold start block on the same attempt
//! instead of racing to create duplicates.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::http::{HttpAuth, HttpClient, HttpRequest};

pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Session layer failures, surfaced as values rather than escaping errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The offline provisioning step never produced credentials for this
    /// identity in this deployment.
    #[error("marketplace identity '{identity}' has no provisioned credentials")]
    NotAuthorized { identity: String },

    #[error("failed to connect session '{identity}': {message}")]
    Connect { identity: String, message: String },

    #[error("session '{identity}' transport error: {message}")]
    Transport { identity: String, message: String },
}

/// Authenticated marketplace session handle.
pub trait MarketSession: Send + Sync {
    fn identity(&self) -> &str;

    /// Whether the handle still considers itself usable. A `false` here makes
    /// the manager lazily reconnect on next use.
    fn is_connected(&self) -> bool;

    /// Requests a web-app view URL scoped to one marketplace mini-app. The
    /// returned URL carries the init-data payload in its fragment.
    fn request_web_view<'a>(
        &'a self,
        bot: &'a str,
        app_short_name: &'a str,
        platform: &'a str,
    ) -> SessionFuture<'a, Result<String, SessionError>>;

    fn disconnect<'a>(&'a self) -> SessionFuture<'a, ()>;
}

/// Creates sessions from durable login state. The seam that behavior tests
/// replace with counting stubs.
pub trait SessionConnector: Send + Sync {
    fn connect<'a>(
        &'a self,
        identity: &'a str,
    ) -> SessionFuture<'a, Result<Arc<dyn MarketSession>, SessionError>>;
}

type SessionSlot = Arc<tokio::sync::Mutex<Option<Arc<dyn MarketSession>>>>;

/// Cache of per-identity sessions with creation-time mutual exclusion.
pub struct SessionManager {
    connector: Arc<dyn SessionConnector>,
    slots: std::sync::Mutex<HashMap<String, SessionSlot>>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            connector,
            slots: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, identity: &str) -> SessionSlot {
        let mut slots = self.slots.lock().expect("session table lock is not poisoned");
        slots.entry(identity.to_owned()).or_default().clone()
    }

    /// Returns the cached session for `identity`, connecting first when the
    /// cache is cold or the cached handle reports itself disconnected.
    ///
    /// The per-identity lock is held across the connect attempt, so a second
    /// caller arriving mid-connect waits for that attempt's outcome instead
    /// of starting its own.
    pub async fn get(&self, identity: &str) -> Result<Arc<dyn MarketSession>, SessionError> {
        let slot = self.slot(identity);
        let mut guard = slot.lock().await;

        if let Some(session) = guard.as_ref() {
            if session.is_connected() {
                return Ok(session.clone());
            }
            tracing::info!(identity, "cached session reported disconnected, reconnecting");
            guard.take();
        }

        match self.connector.connect(identity).await {
            Ok(session) => {
                tracing::info!(identity, "connected and cached marketplace session");
                *guard = Some(session.clone());
                Ok(session)
            }
            Err(error) => {
                tracing::error!(identity, %error, "failed to connect marketplace session");
                Err(error)
            }
        }
    }

    /// Disconnects every cached session and clears the cache. Invoked once at
    /// process shutdown; a manager that never connected anything is fine.
    pub async fn stop_all(&self) {
        let drained: Vec<(String, SessionSlot)> = {
            let mut slots = self.slots.lock().expect("session table lock is not poisoned");
            slots.drain().collect()
        };

        for (identity, slot) in drained {
            let mut guard = slot.lock().await;
            if let Some(session) = guard.take() {
                if session.is_connected() {
                    session.disconnect().await;
                    tracing::info!(identity = identity.as_str(), "stopped marketplace session");
                }
            }
        }
    }
}

/// Durable per-identity credential material written by the offline
/// provisioning flow.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredCredentials {
    pub auth_token: String,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// Production connector: loads `<dir>/<identity>.json` credentials and binds
/// them to an HTTP-backed session against the web-view gateway. A missing
/// credential file means provisioning never ran for that identity.
pub struct StoredSessionConnector {
    http: Arc<dyn HttpClient>,
    gateway_url: String,
    credentials_dir: PathBuf,
}

impl StoredSessionConnector {
    pub fn new(
        http: Arc<dyn HttpClient>,
        gateway_url: impl Into<String>,
        credentials_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            http,
            gateway_url: gateway_url.into(),
            credentials_dir: credentials_dir.into(),
        }
    }
}

impl SessionConnector for StoredSessionConnector {
    fn connect<'a>(
        &'a self,
        identity: &'a str,
    ) -> SessionFuture<'a, Result<Arc<dyn MarketSession>, SessionError>> {
        Box::pin(async move {
            let path = self.credentials_dir.join(format!("{identity}.json"));
            let raw = tokio::fs::read_to_string(&path).await.map_err(|_| {
                SessionError::NotAuthorized {
                    identity: identity.to_owned(),
                }
            })?;

            let credentials: StoredCredentials =
                serde_json::from_str(&raw).map_err(|error| SessionError::Connect {
                    identity: identity.to_owned(),
                    message: format!("malformed credential file: {error}"),
                })?;

            let session = GatewaySession::new(
                identity,
                credentials,
                self.http.clone(),
                self.gateway_url.clone(),
            );
            session.handshake().await?;

            Ok(Arc::new(session) as Arc<dyn MarketSession>)
        })
    }
}

/// HTTP-backed session speaking to the local web-view gateway that holds the
/// actual messenger login.
struct GatewaySession {
    identity: String,
    auth: HttpAuth,
    http: Arc<dyn HttpClient>,
    gateway_url: String,
    connected: AtomicBool,
}

#[derive(Debug, Deserialize)]
struct WebViewResponse {
    #[serde(default)]
    url: Option<String>,
}

impl GatewaySession {
    fn new(
        identity: &str,
        credentials: StoredCredentials,
        http: Arc<dyn HttpClient>,
        gateway_url: String,
    ) -> Self {
        Self {
            identity: identity.to_owned(),
            auth: HttpAuth::BearerToken(credentials.auth_token),
            http,
            gateway_url,
            connected: AtomicBool::new(false),
        }
    }

    /// Validates the stored credentials against the gateway before the
    /// session enters the cache.
    async fn handshake(&self) -> Result<(), SessionError> {
        let request = HttpRequest::get(format!("{}/session", self.gateway_url)).with_auth(&self.auth);

        let response =
            self.http
                .execute(request)
                .await
                .map_err(|error| SessionError::Connect {
                    identity: self.identity.clone(),
                    message: error.message().to_owned(),
                })?;

        if !response.is_success() {
            return Err(SessionError::Connect {
                identity: self.identity.clone(),
                message: format!("gateway rejected credentials with status {}", response.status),
            });
        }

        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn transport_error(&self, message: impl Into<String>) -> SessionError {
        SessionError::Transport {
            identity: self.identity.clone(),
            message: message.into(),
        }
    }
}

impl MarketSession for GatewaySession {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn request_web_view<'a>(
        &'a self,
        bot: &'a str,
        app_short_name: &'a str,
        platform: &'a str,
    ) -> SessionFuture<'a, Result<String, SessionError>> {
        Box::pin(async move {
            let body = serde_json::json!({
                "bot": bot,
                "app_short_name": app_short_name,
                "platform": platform,
                "write_allowed": true,
            });
            let request = HttpRequest::post(format!("{}/web-view", self.gateway_url))
                .with_json_body(body.to_string())
                .with_auth(&self.auth);

            let response = self
                .http
                .execute(request)
                .await
                .map_err(|error| self.transport_error(error.message()))?;

            if response.status == 401 {
                // The gateway no longer honors this login; force a reconnect
                // on the next use of this identity.
                self.connected.store(false, Ordering::SeqCst);
                return Err(self.transport_error("gateway session expired"));
            }
            if !response.is_success() {
                return Err(self.transport_error(format!(
                    "web-view request returned status {}",
                    response.status
                )));
            }

            let parsed: WebViewResponse = serde_json::from_str(&response.body)
                .map_err(|error| self.transport_error(format!("malformed web-view response: {error}")))?;

            parsed
                .url
                .ok_or_else(|| self.transport_error("web-view response carried no url"))
        })
    }

    fn disconnect<'a>(&'a self) -> SessionFuture<'a, ()> {
        Box::pin(async move {
            self.connected.store(false, Ordering::SeqCst);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::NoopHttpClient;

    #[tokio::test]
    async fn missing_credential_file_surfaces_not_authorized() {
        let dir = tempfile::tempdir().expect("temp dir");
        let connector = StoredSessionConnector::new(
            Arc::new(NoopHttpClient),
            "http://127.0.0.1:8787",
            dir.path(),
        );

        let error = connector
            .connect("portals")
            .await
            .map(|_| ())
            .expect_err("no credentials were provisioned");

        assert_eq!(
            error,
            SessionError::NotAuthorized {
                identity: String::from("portals")
            }
        );
    }

    #[tokio::test]
    async fn provisioned_credentials_produce_a_connected_session() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join("mrkt.json"),
            r#"{"auth_token": "tok-1", "user_id": 42}"#,
        )
        .expect("write credentials");

        let connector = StoredSessionConnector::new(
            Arc::new(NoopHttpClient),
            "http://127.0.0.1:8787",
            dir.path(),
        );

        let session = connector.connect("mrkt").await.expect("session connects");
        assert_eq!(session.identity(), "mrkt");
        assert!(session.is_connected());

        session.disconnect().await;
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn malformed_credential_file_is_a_connect_failure() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("portals.json"), "not json").expect("write credentials");

        let connector = StoredSessionConnector::new(
            Arc::new(NoopHttpClient),
            "http://127.0.0.1:8787",
            dir.path(),
        );

        let error = connector
            .connect("portals")
            .await
            .map(|_| ())
            .expect_err("credentials should fail to parse");

        assert!(matches!(error, SessionError::Connect { .. }));
    }
}
