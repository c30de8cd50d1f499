//! Composable JSON-RPC transports.
//!
//! A transport expression (see [`TransportExpr`]) is parsed into a tree and
//! then interpreted into a boxed alloy transport:
//!
//! - `http://...` / `https://...` → alloy [`Http`] over a shared `reqwest` client
//! - `fallback(...)` → [`FallbackTransport`]
//! - `loadbalance(...)` → [`LoadBalanceTransport`]
//!
//! Both combinators are tower services over JSON-RPC packets, so the result
//! plugs into an alloy `RpcClient` like any other transport. Parsing and
//! execution are kept apart so the tree can be validated at startup and tests
//! can substitute leaf endpoints.

mod expr;

pub use alloy::transports::TransportError;
pub use expr::{ExprError, TransportExpr};

use alloy::rpc::json_rpc::{RequestPacket, ResponsePacket};
use alloy::transports::http::Http;
use alloy::transports::{BoxTransport, RpcError, TransportErrorKind, TransportFut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Service, ServiceExt};
use tracing::{debug, warn};

/// Default per-request timeout for leaf endpoints.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared handle to a composed transport.
pub type Transport = BoxTransport;

/// Whether a fallback transport should move on to its next endpoint.
///
/// Only failures of the endpoint itself qualify: connection errors, timeouts,
/// HTTP 429 and 5xx. A JSON-RPC error payload means the request reached a node
/// and was rejected, so another node would reject it too.
pub fn is_retryable(error: &TransportError) -> bool {
    match error {
        RpcError::Transport(kind) => match kind {
            TransportErrorKind::HttpError(http) => http.status == 429 || http.status >= 500,
            TransportErrorKind::Custom(_) | TransportErrorKind::BackendGone => true,
            _ => false,
        },
        _ => false,
    }
}

/// Options shared by every leaf endpoint of a resolved transport.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// HTTP client (connection pool shared across endpoints)
    pub client: reqwest::Client,
    /// Per-request timeout, already applied to `client`
    pub timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl TransportOptions {
    /// Create options whose HTTP client times out each request after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build HTTP client with timeout, using defaults");
                reqwest::Client::new()
            });
        Self { client, timeout }
    }
}

/// Parse and build a transport from an expression.
pub fn resolve(expression: &str, options: &TransportOptions) -> Result<Transport, ExprError> {
    build(&TransportExpr::parse(expression)?, options)
}

/// Build a live transport from a parsed expression using HTTP leaves.
pub fn build(expr: &TransportExpr, options: &TransportOptions) -> Result<Transport, ExprError> {
    build_with(expr, &|url| {
        let parsed = url.parse().map_err(|_| ExprError::InvalidUrl(url.to_string()))?;
        Ok(BoxTransport::new(Http::with_client(options.client.clone(), parsed)))
    })
}

/// Build a transport tree with a custom leaf constructor.
pub fn build_with(
    expr: &TransportExpr,
    leaf: &dyn Fn(&str) -> Result<Transport, ExprError>,
) -> Result<Transport, ExprError> {
    let children = |exprs: &[TransportExpr]| {
        exprs
            .iter()
            .map(|c| build_with(c, leaf))
            .collect::<Result<Vec<_>, _>>()
    };

    Ok(match expr {
        TransportExpr::Http(url) => leaf(url)?,
        TransportExpr::Fallback(exprs) => BoxTransport::new(FallbackTransport::new(children(exprs)?)),
        TransportExpr::LoadBalance(exprs) => {
            BoxTransport::new(LoadBalanceTransport::new(children(exprs)?))
        }
    })
}

/// Tries each child in order until one answers or fails non-retryably.
///
/// Any response packet counts as an answer, including JSON-RPC error payloads.
#[derive(Debug, Clone)]
pub struct FallbackTransport {
    children: Arc<[Transport]>,
}

impl FallbackTransport {
    pub fn new(children: Vec<Transport>) -> Self {
        Self {
            children: children.into(),
        }
    }
}

impl Service<RequestPacket> for FallbackTransport {
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = TransportFut<'static>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: RequestPacket) -> Self::Future {
        let children = self.children.clone();
        Box::pin(async move {
            let mut last_error = None;

            for (i, child) in children.iter().enumerate() {
                match child.clone().oneshot(request.clone()).await {
                    Ok(response) => return Ok(response),
                    Err(e) if is_retryable(&e) => {
                        warn!(endpoint = i, error = %e, "Endpoint failed, trying next");
                        last_error = Some(e);
                    }
                    Err(e) => return Err(e),
                }
            }

            Err(last_error.unwrap_or_else(|| TransportErrorKind::custom_str("fallback() has no endpoints")))
        })
    }
}

/// Distributes requests across children round-robin.
#[derive(Debug, Clone)]
pub struct LoadBalanceTransport {
    children: Arc<[Transport]>,
    cursor: Arc<AtomicUsize>,
}

impl LoadBalanceTransport {
    pub fn new(children: Vec<Transport>) -> Self {
        Self {
            children: children.into(),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Service<RequestPacket> for LoadBalanceTransport {
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = TransportFut<'static>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: RequestPacket) -> Self::Future {
        if self.children.is_empty() {
            return Box::pin(async {
                Err::<ResponsePacket, _>(TransportErrorKind::custom_str("loadbalance() has no endpoints"))
            });
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.children.len();
        debug!(endpoint = index, "Load-balanced request");
        let child = self.children[index].clone();
        Box::pin(child.oneshot(request))
    }
}
