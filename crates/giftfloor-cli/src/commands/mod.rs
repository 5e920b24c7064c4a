mod price;
mod rates;

use std::sync::Arc;

use giftfloor_core::{
    Aggregator, ConnectionPool, HttpClient, MrktMarketplace, PooledHttpClient, PortalsMarketplace,
    RateResolver, SessionManager, Settings, StoredSessionConnector, TonnelMarketplace,
};

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::Report;

/// Wires the engine together for one process: shared connection pool, session
/// cache, the three marketplace adapters, and the rate resolver.
pub struct AppContext {
    pool: Arc<ConnectionPool>,
    sessions: Arc<SessionManager>,
    pub aggregator: Aggregator,
    pub rates: RateResolver,
}

impl AppContext {
    pub fn new(settings: Settings) -> Self {
        let pool = Arc::new(ConnectionPool::new(settings.http));
        let http: Arc<dyn HttpClient> = Arc::new(PooledHttpClient::new(pool.clone()));

        let connector = Arc::new(StoredSessionConnector::new(
            http.clone(),
            settings.session.gateway_url.clone(),
            settings.session.credentials_dir.clone(),
        ));
        let sessions = Arc::new(SessionManager::new(connector));

        let aggregator = Aggregator::new(vec![
            Arc::new(TonnelMarketplace::new(
                http.clone(),
                settings.tonnel.clone(),
                settings.retry,
            )),
            Arc::new(PortalsMarketplace::new(
                http.clone(),
                sessions.clone(),
                settings.portals.clone(),
                settings.retry,
            )),
            Arc::new(MrktMarketplace::new(
                http.clone(),
                sessions.clone(),
                settings.mrkt.clone(),
                settings.retry,
            )),
        ]);
        let rates = RateResolver::new(http, settings.rates.clone());

        Self {
            pool,
            sessions,
            aggregator,
            rates,
        }
    }

    /// Disconnects cached sessions and releases pooled connections.
    pub async fn shutdown(&self) {
        self.sessions.stop_all().await;
        self.pool.close().await;
    }
}

pub async fn run(cli: &Cli) -> Result<Report, CliError> {
    let context = AppContext::new(Settings::from_env());

    let result = match &cli.command {
        Command::Price(args) => price::run(args, &context).await,
        Command::Rates => rates::run(&context).await,
    };

    context.shutdown().await;
    result
}
