//! HTTP request handlers.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use chainwatch_node::tracing_spans::rpc_span;
use chainwatch_node::WalkerStatus;
use chainwatch_types::{Address, Transaction};

use crate::server::ApiState;
use crate::RpcError;

const NO_TRANSACTIONS_MESSAGE: &str = "No transactions found for this address";

// ── Requests ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    pub address: Option<String>,
}

impl AddressQuery {
    fn required(&self) -> Result<&str, RpcError> {
        match self.address.as_deref() {
            Some(a) if !a.trim().is_empty() => Ok(a),
            _ => Err(RpcError::InvalidRequest("missing address".into())),
        }
    }
}

// ── Responses ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub status: String,
    pub address: Address,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub address: Address,
    pub transactions: Vec<Transaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub current_block: u64,
    pub subscriptions: u64,
    pub walker: WalkerStatus,
}

// ── Handlers ─────────────────────────────────────────────────────────────

pub async fn current_block(State(state): State<ApiState>) -> Result<Json<u64>, RpcError> {
    let _span = rpc_span("/currentBlock").entered();
    Ok(Json(state.service.current_block()?))
}

pub async fn subscribe(
    State(state): State<ApiState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<SubscribeResponse>, RpcError> {
    let _span = rpc_span("/subscribe").entered();
    let outcome = state.service.subscribe(query.required()?)?;
    let status = if outcome.newly_subscribed {
        "Subscribed"
    } else {
        "Already Subscribed"
    };
    Ok(Json(SubscribeResponse {
        status: status.to_string(),
        address: outcome.address,
    }))
}

pub async fn transactions(
    State(state): State<ApiState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<TransactionsResponse>, RpcError> {
    let _span = rpc_span("/transactions").entered();
    let (address, transactions) = state.service.transactions(query.required()?)?;
    let message = transactions
        .is_empty()
        .then(|| NO_TRANSACTIONS_MESSAGE.to_string());
    Ok(Json(TransactionsResponse {
        address,
        transactions,
        message,
    }))
}

pub async fn status(State(state): State<ApiState>) -> Result<Json<StatusResponse>, RpcError> {
    let _span = rpc_span("/status").entered();
    Ok(Json(StatusResponse {
        current_block: state.service.current_block()?,
        subscriptions: state.service.subscription_count()?,
        walker: state.status.snapshot(),
    }))
}

pub async fn metrics(State(state): State<ApiState>) -> Result<impl IntoResponse, RpcError> {
    let _span = rpc_span("/metrics").entered();
    let Some(metrics) = state.metrics.as_ref() else {
        return Err(RpcError::NotFound("metrics are disabled".into()));
    };
    let body = metrics
        .encode()
        .map_err(|e| RpcError::Metrics(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
