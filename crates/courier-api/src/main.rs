//! # courier-api: Binary Entry Point
//!
//! Wires the marketplace from the environment and serves it over HTTP.
//! Postgres and the ledger gateway are both optional; without them the
//! service runs on in-memory backends for development.

use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;

use courier_api::db::{self, PgRepository};
use courier_api::state::{AppConfig, AppState};
use courier_engine::{ContractEngine, Marketplace, MemoryRepository};
use courier_ledger::config::ConfigError;
use courier_ledger::{EscrowLedgerPort, GatewayLedger, InMemoryLedger, LedgerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    init_tracing(config.log_json);

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("installing Prometheus recorder")?;

    let ledger: Arc<dyn EscrowLedgerPort> = match LedgerConfig::from_env() {
        Ok(ledger_config) => {
            tracing::info!(url = %ledger_config.gateway_url, "ledger gateway configured");
            Arc::new(GatewayLedger::new(ledger_config).context("building ledger client")?)
        }
        Err(ConfigError::MissingUrl) => {
            tracing::warn!(
                "LEDGER_GATEWAY_URL not set, using the in-memory ledger. \
                 Escrows are simulated and do not move funds."
            );
            Arc::new(InMemoryLedger::new())
        }
        Err(e) => return Err(e).context("reading ledger configuration"),
    };

    let market: Arc<dyn Marketplace> = match db::init_pool()
        .await
        .context("initializing database")?
    {
        Some(pool) => Arc::new(ContractEngine::new(PgRepository::new(pool), ledger)),
        None => Arc::new(ContractEngine::new(MemoryRepository::new(), ledger)),
    };

    let port = config.port;
    tracing::info!(?config, "starting courier marketplace");
    let app = courier_api::app(AppState::with_config(config, market, Some(metrics)));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("courier API listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
