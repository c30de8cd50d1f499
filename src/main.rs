//! Morpho Indexer Query Service
//!
//! Read-side service over an indexed Morpho Blue deployment.
//! Features:
//! - Market, vault and withdraw-queue queries over indexed rows
//! - Liquidation and pre-liquidation candidates from live chain reads
//! - `eth_getLogs` emulation over indexed logs
//! - Factory discovery of MetaMorpho vaults and pre-liquidation contracts

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use indexer_api::{create_router, AppState, Readers, WatchSets};
use indexer_chain::{ChainClient, ContractKind, Discovery, LiveReader, LogPoller, MorphoReader};
use indexer_core::{ChainRegistry, EngineConfig, IndexStore, MemoryStore, PgStore, ServiceConfig};
use tokio::task::JoinHandle;

const DEFAULT_LOG_FILTER: &str = "info,indexer_core=debug,indexer_chain=debug,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let config = ServiceConfig::load().context("Failed to load configuration")?;
    config.log_config();

    info!(chains = ?config.registry.supported_names(), "Starting Morpho indexer query service");

    let store = open_store(config.database_url.as_deref()).await?;
    let readers = build_readers(&config.registry, config.engine);
    let (watch_sets, pollers) = spawn_pollers(&config.registry, config.engine);

    let port = config.server.port;
    let state = AppState::new(
        Arc::new(config.registry),
        store,
        readers,
        watch_sets,
        config.engine,
        config.server,
    );
    let router = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for poller in pollers {
        poller.abort();
    }
    info!("Shut down");
    Ok(())
}

/// `RUST_LOG` filter, JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
    }
}

async fn open_store(database_url: Option<&str>) -> Result<Arc<dyn IndexStore>> {
    match database_url {
        Some(url) => {
            let store = PgStore::connect(url).await.context("Failed to connect to Postgres")?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set, serving from an empty in-memory index");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn build_readers(registry: &ChainRegistry, engine: EngineConfig) -> Readers {
    let mut readers = Readers::new();
    for chain in registry.all() {
        let Some(morpho) = chain.address_of(ContractKind::Morpho) else {
            warn!(chain = %chain.name, "No Morpho address, liquidation endpoints disabled");
            continue;
        };
        let client = ChainClient::new(chain.transport.clone(), engine.rpc_timeout);
        let reader: Arc<dyn LiveReader> = Arc::new(MorphoReader::new(client, morpho));
        readers.insert(chain.chain_id, reader);
    }
    readers
}

/// One factory log poller per chain, running until discovery halts.
///
/// Each poller writes the chain's watch set; the same `Arc` is handed to the
/// API so `/health` and pre-liquidation lookups read discovery state.
fn spawn_pollers(registry: &ChainRegistry, engine: EngineConfig) -> (WatchSets, Vec<JoinHandle<()>>) {
    let mut watch_sets = WatchSets::new();
    let mut pollers = Vec::new();

    for chain in registry.all() {
        let watch_set = Arc::new(chain.watch_set());
        let discovery = Discovery::new(chain.factory_sources(), watch_set.clone());
        let client = ChainClient::new(chain.transport.clone(), engine.rpc_timeout);
        let poller = LogPoller::new(chain.name.as_str(), client, discovery, chain.polling_interval);
        let name = chain.name;

        pollers.push(tokio::spawn(async move {
            if let Err(e) = poller.run().await {
                error!(chain = %name, error = %e, "Factory log poller stopped");
            }
        }));
        watch_sets.insert(chain.chain_id, watch_set);
    }
    (watch_sets, pollers)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
