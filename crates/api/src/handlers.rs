//! HTTP handlers.
//!
//! Bodies are taken as raw bytes and parsed here so that malformed input
//! yields the explicit 400 messages clients rely on instead of the framework's
//! generic rejections.

use crate::error::ApiError;
use crate::state::AppState;
use alloy::primitives::{Address, B256};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use indexer_core::rpc::{self, RpcError};
use indexer_core::store::timed;
use indexer_core::{CandidateReport, LiquidationCandidate, MarketView, PreLiquidationCandidate, VaultView};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

const MARKET_IDS_MESSAGE: &str = "Request body must include a `marketIds` array.";
const VAULTS_MESSAGE: &str = "Request body must include a `vaults` array.";

/// Body as JSON; an empty body reads as `{}`.
fn json_body(body: &Bytes) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Request body is not valid JSON: {e}")))
}

fn parse_market_id(raw: &str) -> Result<B256, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("`{raw}` is not a valid market id")))
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("`{raw}` is not a valid address")))
}

/// Array field of `body` as strings, or `message` when it is missing or not an array.
fn string_array<'a>(body: &'a Value, field: &str, message: &str) -> Result<Vec<&'a str>, ApiError> {
    let items = body
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::bad_request(message))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| ApiError::bad_request(format!("`{field}` must contain only strings")))
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MarketBody {
    with_positions: bool,
    with_vaults: bool,
}

pub async fn market(
    State(state): State<AppState>,
    Path((chain_id, market_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Option<MarketView>>, ApiError> {
    let chain = state.chain(&chain_id)?;
    let market_id = parse_market_id(&market_id)?;
    let options: MarketBody = serde_json::from_value(json_body(&body)?)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?;

    let view = state
        .queries
        .market(chain.chain_id, market_id, options.with_positions, options.with_vaults)
        .await?;
    Ok(Json(view))
}

pub async fn withdraw_queue(
    State(state): State<AppState>,
    Path((chain_id, address)): Path<(String, String)>,
) -> Result<Json<Vec<B256>>, ApiError> {
    let chain = state.chain(&chain_id)?;
    let vault = parse_address(&address)?;
    Ok(Json(state.queries.vault_withdraw_queue(chain.chain_id, vault).await?))
}

pub async fn withdraw_queue_set(
    State(state): State<AppState>,
    Path(chain_id): Path<String>,
    body: Bytes,
) -> Result<Json<Vec<B256>>, ApiError> {
    let chain = state.chain(&chain_id)?;
    let body = json_body(&body)?;
    let vaults = string_array(&body, "vaults", VAULTS_MESSAGE)?
        .into_iter()
        .map(parse_address)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(state.queries.withdraw_queue_market_set(chain.chain_id, &vaults).await?))
}

pub async fn vault(
    State(state): State<AppState>,
    Path((chain_id, address)): Path<(String, String)>,
) -> Result<Json<Option<VaultView>>, ApiError> {
    let chain = state.chain(&chain_id)?;
    let address = parse_address(&address)?;
    Ok(Json(state.queries.vault(chain.chain_id, address).await?))
}

/// Market ids from a `{ marketIds }` body. The array check comes before the
/// chain check, matching the order clients have always observed.
fn market_ids(body: &Bytes) -> Result<Vec<B256>, ApiError> {
    let body = json_body(body)?;
    string_array(&body, "marketIds", MARKET_IDS_MESSAGE)?
        .into_iter()
        .map(parse_market_id)
        .collect()
}

pub async fn liquidatable_positions(
    State(state): State<AppState>,
    Path(chain_id): Path<String>,
    body: Bytes,
) -> Result<Json<CandidateReport<LiquidationCandidate>>, ApiError> {
    let market_ids = market_ids(&body)?;
    let chain = state.chain(&chain_id)?;
    let reader = state.reader(chain)?;

    let report = state
        .engine
        .liquidatable(chain.chain_id, reader.as_ref(), &market_ids)
        .await?;
    Ok(Json(report))
}

pub async fn preliquidations(
    State(state): State<AppState>,
    Path(chain_id): Path<String>,
    body: Bytes,
) -> Result<Json<CandidateReport<PreLiquidationCandidate>>, ApiError> {
    let market_ids = market_ids(&body)?;
    let chain = state.chain(&chain_id)?;
    let reader = state.reader(chain)?;

    let report = state
        .engine
        .preliquidatable(chain.chain_id, reader.as_ref(), &market_ids, state.watch_set(chain))
        .await?;
    Ok(Json(report))
}

/// JSON-RPC endpoint. Protocol-level failures are JSON-RPC errors, not HTTP errors.
pub async fn json_rpc(
    State(state): State<AppState>,
    Path(chain_id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let chain = state.chain(&chain_id)?;
    let request: Value = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Unparseable JSON-RPC body");
            return Ok(Json(rpc::response(Value::Null, Err(RpcError::parse_error("parse error")))));
        }
    };
    Ok(Json(state.logs.handle(chain.chain_id, request).await))
}

/// Registered chains, how far each is indexed and factory discovery progress.
///
/// Any chain whose discovery halted makes the service `degraded` (HTTP 503).
pub async fn health(State(state): State<AppState>) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut chains = Vec::with_capacity(state.registry.len());
    let mut halted = false;
    for chain in state.registry.all() {
        let latest = timed(
            "latest_indexed_block",
            state.store_timeout,
            state.queries.store().latest_indexed_block(chain.chain_id),
        )
        .await?;
        let discovery = state.watch_set(chain).map(|watch_set| {
            halted |= watch_set.is_halted();
            json!({
                "processedThrough": watch_set.processed_through().map(|block| indexer_core::wide::to_wide_string(&block)),
                "discovered": watch_set.discovered_count(),
                "halted": watch_set.is_halted(),
            })
        });
        chains.push(json!({
            "name": chain.name.as_str(),
            "chainId": chain.chain_id,
            "latestIndexedBlock": latest.map(|block| indexer_core::wide::to_wide_string(&block)),
            "discovery": discovery,
        }));
    }

    let (status, label) = if halted {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };
    Ok((status, Json(json!({ "status": label, "chains": chains }))))
}
