use crate::error::ApiError;
use crate::rate_limit::RateLimiter;
use indexer_chain::{LiveReader, WatchSet};
use indexer_core::{
    ChainConfig, ChainRegistry, EngineConfig, IndexStore, LiquidationEngine, LogEmulator,
    QueryService, ServerConfig,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Live readers keyed by chain id.
pub type Readers = HashMap<u64, Arc<dyn LiveReader>>;

/// Discovery watch sets keyed by chain id, shared with the log pollers.
pub type WatchSets = HashMap<u64, Arc<WatchSet>>;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ChainRegistry>,
    pub queries: QueryService,
    pub engine: Arc<LiquidationEngine>,
    pub logs: Arc<LogEmulator>,
    pub readers: Arc<Readers>,
    pub discovery: Arc<WatchSets>,
    pub limiter: Arc<RateLimiter>,
    pub store_timeout: Duration,
}

impl AppState {
    pub fn new(
        registry: Arc<ChainRegistry>,
        store: Arc<dyn IndexStore>,
        readers: Readers,
        discovery: WatchSets,
        engine: EngineConfig,
        server: ServerConfig,
    ) -> Self {
        Self {
            registry,
            queries: QueryService::new(store.clone(), engine.store_timeout),
            engine: Arc::new(LiquidationEngine::new(store.clone(), engine)),
            logs: Arc::new(LogEmulator::new(store, engine.max_logs, engine.store_timeout)),
            readers: Arc::new(readers),
            discovery: Arc::new(discovery),
            limiter: Arc::new(RateLimiter::new(
                server.rate_limit_per_second,
                Duration::from_secs(1),
            )),
            store_timeout: engine.store_timeout,
        }
    }

    /// Resolve the `:chainId` path segment to a registered chain.
    pub fn chain(&self, raw: &str) -> Result<&ChainConfig, ApiError> {
        raw.parse::<u64>()
            .ok()
            .and_then(|id| self.registry.by_chain_id(id))
            .ok_or_else(|| {
                ApiError::bad_request(format!(
                    "{raw} is not one of the supported chains: [{}]",
                    self.registry.supported_names().join(", ")
                ))
            })
    }

    pub fn watch_set(&self, chain: &ChainConfig) -> Option<&WatchSet> {
        self.discovery.get(&chain.chain_id).map(Arc::as_ref)
    }

    pub fn reader(&self, chain: &ChainConfig) -> Result<Arc<dyn LiveReader>, ApiError> {
        self.readers.get(&chain.chain_id).cloned().ok_or_else(|| {
            ApiError::bad_request(format!("{} has no Morpho deployment configured", chain.name))
        })
    }
}
