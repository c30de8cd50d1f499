//! HTTP surface of the Morpho indexer.
//!
//! This crate provides:
//! - Market, vault and withdraw-queue queries over indexed rows
//! - Liquidation and pre-liquidation candidate endpoints
//! - A JSON-RPC endpoint emulating `eth_getLogs` per chain
//! - Per-client rate limiting and a `/health` endpoint with discovery status

mod error;
mod handlers;
mod rate_limit;
mod router;
mod state;

pub use error::ApiError;
pub use rate_limit::{client_key, RateLimiter};
pub use router::create_router;
pub use state::{AppState, Readers, WatchSets};
