use crate::handlers;
use crate::rate_limit::rate_limit;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/chain/:chain_id/market/:market_id", post(handlers::market))
        .route("/chain/:chain_id/withdraw-queue/:address", post(handlers::withdraw_queue))
        .route("/chain/:chain_id/withdraw-queue-set", post(handlers::withdraw_queue_set))
        .route("/chain/:chain_id/vault/:address", post(handlers::vault))
        .route(
            "/chain/:chain_id/liquidatable-positions",
            post(handlers::liquidatable_positions),
        )
        .route("/chain/:chain_id/preliquidations", post(handlers::preliquidations))
        .route("/rpc/:chain_id", post(handlers::json_rpc))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(api_routes)
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Readers, WatchSets};
    use alloy::primitives::{Address, Bytes, B256, U256};
    use alloy::sol_types::SolValue;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use indexer_chain::contracts::MarketParams;
    use indexer_chain::{BlockRef, ChainLog, ClientError, ContractKind, Discovery, LiveReader, MarketState};
    use indexer_core::store::{MemoryStore, PositionRow, WithdrawQueueItemRow};
    use indexer_core::{EngineConfig, ServerConfig, ServiceConfig};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const CHAIN: u64 = 1337;
    const LLTV: u64 = 800_000_000_000_000_000;

    /// One market at the 1:1 oracle price, no interest since the last update.
    struct FixedReader;

    #[async_trait]
    impl LiveReader for FixedReader {
        async fn latest_block(&self) -> Result<BlockRef, ClientError> {
            Ok(BlockRef {
                number: 42,
                timestamp: 1_000,
                hash: B256::ZERO,
            })
        }

        async fn market_params(&self, _id: B256, _block: u64) -> Result<MarketParams, ClientError> {
            Ok(MarketParams {
                loanToken: Address::repeat_byte(0x10),
                collateralToken: Address::repeat_byte(0x20),
                oracle: Address::repeat_byte(0x30),
                irm: Address::ZERO,
                lltv: U256::from(LLTV),
            })
        }

        async fn market_state(&self, _id: B256, _block: u64) -> Result<MarketState, ClientError> {
            Ok(MarketState {
                total_supply_assets: U256::from(2_000),
                total_supply_shares: U256::from(2_000_000_000u64),
                total_borrow_assets: U256::from(999),
                total_borrow_shares: U256::from(999_000_000u64),
                last_update: 1_000,
                fee: U256::ZERO,
            })
        }

        async fn oracle_price(&self, _oracle: Address, _block: u64) -> Result<U256, ClientError> {
            Ok(U256::from(10u64).pow(U256::from(36)))
        }

        async fn borrow_rate(
            &self,
            _params: &MarketParams,
            _state: &MarketState,
            _block: u64,
        ) -> Result<U256, ClientError> {
            Ok(U256::ZERO)
        }
    }

    fn config() -> ServiceConfig {
        let env = |name: &str| match name {
            "SELECTED_CHAINS" => Some("localDocker".to_string()),
            "PONDER_RPC_URL_1337" => Some("http://127.0.0.1:8545".to_string()),
            _ => None,
        };
        ServiceConfig::from_sources(None, "test", &env).unwrap()
    }

    fn app_with(store: MemoryStore, rate_limit: u32, discovery: WatchSets) -> Router {
        let mut readers: Readers = Readers::new();
        readers.insert(CHAIN, Arc::new(FixedReader));

        let server = ServerConfig {
            rate_limit_per_second: rate_limit,
            ..ServerConfig::default()
        };
        create_router(AppState::new(
            Arc::new(config().registry),
            Arc::new(store),
            readers,
            discovery,
            EngineConfig::default(),
            server,
        ))
    }

    fn app(store: MemoryStore) -> Router {
        app_with(store, 20, WatchSets::new())
    }

    /// Discovery over the local chain's factories, sharing its watch set.
    fn local_discovery() -> (Discovery, WatchSets) {
        let config = config();
        let chain = config.registry.by_chain_id(CHAIN).unwrap();
        let watch_set = Arc::new(chain.watch_set());
        let discovery = Discovery::new(chain.factory_sources(), watch_set.clone());
        (discovery, WatchSets::from([(CHAIN, watch_set)]))
    }

    /// `CreateMetaMorpho` log from the first MetaMorpho factory of `discovery`.
    fn create_vault_log(discovery: &Discovery, vault: Address, block: u64) -> ChainLog {
        let source = discovery
            .sources()
            .iter()
            .find(|source| source.kind == ContractKind::MetaMorpho)
            .unwrap();
        let data = (
            Address::repeat_byte(0x0a),
            U256::from(86_400u64),
            "Vault".to_string(),
            "VLT".to_string(),
            B256::ZERO,
        )
            .abi_encode_params();

        ChainLog {
            block_number: block,
            block_hash: B256::repeat_byte(0x01),
            transaction_hash: B256::repeat_byte(0x77),
            transaction_index: 0,
            log_index: 0,
            address: source.factory.address,
            topics: [
                source.factory.selector(),
                vault.into_word(),
                Address::repeat_byte(0x0c).into_word(),
                Address::repeat_byte(0x0e).into_word(),
            ]
            .into_iter()
            .collect(),
            data: Bytes::from(data),
        }
    }

    fn start_block(discovery: &Discovery) -> u64 {
        discovery
            .sources()
            .iter()
            .map(|source| source.start_block)
            .max()
            .unwrap_or(0)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_market_ids_must_be_array() {
        let (status, body) = send(
            app(MemoryStore::new()),
            post_json("/chain/1337/liquidatable-positions", r#"{"marketIds":"not-an-array"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Request body must include a `marketIds` array." }));

        // the array check comes first, even on an unknown chain
        let (status, body) = send(
            app(MemoryStore::new()),
            post_json("/chain/1/preliquidations", "{}"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Request body must include a `marketIds` array."));
    }

    #[tokio::test]
    async fn test_unsupported_chain() {
        let (status, body) = send(
            app(MemoryStore::new()),
            post_json("/chain/1/liquidatable-positions", r#"{"marketIds":[]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "error": "1 is not one of the supported chains: [localDocker]" })
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (status, body) = send(
            app(MemoryStore::new()),
            post_json("/chain/1337/withdraw-queue-set", "{vaults:"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Request body is not valid JSON"));
    }

    #[tokio::test]
    async fn test_invalid_path_params() {
        let (status, _) = send(
            app(MemoryStore::new()),
            post_json("/chain/1337/market/0x1234", "{}"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            app(MemoryStore::new()),
            post_json("/chain/1337/vault/not-an-address", ""),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_market_is_null() {
        let uri = format!("/chain/1337/market/{}", B256::repeat_byte(1));
        let (status, body) = send(
            app(MemoryStore::new()),
            post_json(&uri, r#"{"withPositions":true}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn test_withdraw_queue_set() {
        let store = MemoryStore::new();
        let (v1, v2) = (Address::repeat_byte(1), Address::repeat_byte(2));
        for (vault, ordinal, market) in [(v1, 0, 1u8), (v1, 1, 2), (v2, 0, 3), (v2, 1, 1)] {
            store.insert_withdraw_queue_item(WithdrawQueueItemRow {
                chain_id: CHAIN,
                address: vault,
                ordinal,
                market_id: Some(B256::repeat_byte(market)),
            });
        }

        let body = json!({ "vaults": [v1, v1, v2] }).to_string();
        let (status, body) = send(app(store), post_json("/chain/1337/withdraw-queue-set", &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([B256::repeat_byte(1), B256::repeat_byte(2), B256::repeat_byte(3)])
        );
    }

    #[tokio::test]
    async fn test_liquidatable_positions() {
        let store = MemoryStore::new();
        let market = B256::repeat_byte(0xaa);
        for (borrower, collateral) in [(1u8, 1_000u64), (2, 999)] {
            store.insert_position(PositionRow {
                chain_id: CHAIN,
                market_id: market,
                user: Address::repeat_byte(borrower),
                supply_shares: U256::ZERO,
                borrow_shares: U256::from(800_000_000u64),
                collateral: U256::from(collateral),
            });
        }

        let body = json!({ "marketIds": [market, market] }).to_string();
        let (status, body) = send(app(store), post_json("/chain/1337/liquidatable-positions", &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["blockNumber"], json!("42n"));
        let candidates = body["candidates"].as_array().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0]["borrowedAssets"], json!("800n"));
        assert_eq!(candidates[0]["maxBorrow"], json!("799n"));
    }

    #[tokio::test]
    async fn test_rpc_endpoint() {
        let store = MemoryStore::new();
        store.set_latest_indexed_block(CHAIN, 7);
        let request = r#"[{"jsonrpc":"2.0","id":1,"method":"eth_chainId"},{"jsonrpc":"2.0","id":2,"method":"eth_blockNumber"}]"#;

        let (status, body) = send(app(store), post_json("/rpc/1337", request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["result"], json!("0x539"));
        assert_eq!(body[1]["result"], json!("0x7"));

        let (_, body) = send(app(MemoryStore::new()), post_json("/rpc/1337", "not json")).await;
        assert_eq!(body["error"]["code"], json!(-32700));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let app = app_with(MemoryStore::new(), 2, WatchSets::new());
        let request = || {
            let mut request = post_json("/chain/1337/withdraw-queue-set", r#"{"vaults":[]}"#);
            request
                .headers_mut()
                .insert("x-forwarded-for", "9.9.9.9".parse().unwrap());
            request
        };

        for _ in 0..2 {
            let response = app.clone().oneshot(request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));

        // health is not rate limited
        let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(health).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health() {
        let store = MemoryStore::new();
        store.set_latest_indexed_block(CHAIN, 12);
        let health = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let (status, body) = send(app(store), health).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("ok"));
        assert_eq!(body["chains"][0]["name"], json!("localDocker"));
        assert_eq!(body["chains"][0]["latestIndexedBlock"], json!("12n"));
        assert_eq!(body["chains"][0]["discovery"], Value::Null);
    }

    #[tokio::test]
    async fn test_health_reports_discovered_children() {
        let (mut discovery, watch_sets) = local_discovery();
        let block = start_block(&discovery) + 1;
        let vault = Address::repeat_byte(0x55);
        let log = create_vault_log(&discovery, vault, block);
        assert_eq!(discovery.process_block(block, &[log]).unwrap().len(), 1);

        let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app_with(MemoryStore::new(), 20, watch_sets), health).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["chains"][0]["discovery"],
            json!({
                "processedThrough": format!("{block}n"),
                "discovered": 1,
                "halted": false,
            })
        );
    }

    #[tokio::test]
    async fn test_health_degraded_when_discovery_halts() {
        let (mut discovery, watch_sets) = local_discovery();
        let block = start_block(&discovery) + 1;
        let mut broken = create_vault_log(&discovery, Address::repeat_byte(0x55), block);
        broken.data = Bytes::from_static(&[0x01, 0x02]);
        assert!(discovery.process_block(block, &[broken]).is_err());

        let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app_with(MemoryStore::new(), 20, watch_sets), health).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], json!("degraded"));
        assert_eq!(body["chains"][0]["discovery"]["halted"], json!(true));
        assert_eq!(body["chains"][0]["discovery"]["discovered"], json!(0));
    }
}
