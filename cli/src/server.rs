//! HTTP query API over the index.
//!
//! ```text
//! GET  /current-block            {"currentBlock": n}
//! POST /subscribe?address=0x..   {"subscribed": bool}
//! GET  /transactions?address=0x.. [Transaction, ...]
//! GET  /subscriptions            ["0x..", ...]
//! GET  /health                   {"status": "ok", "state": "...", "currentBlock": n}
//! ```

use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use txwatch_core::{IndexQuery, IndexerError, IndexerState, Transaction};

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    query: IndexQuery,
    sync_state: watch::Receiver<IndexerState>,
}

impl AppState {
    pub fn new(query: IndexQuery, sync_state: watch::Receiver<IndexerState>) -> Self {
        Self { query, sync_state }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddressParams {
    address: Option<String>,
}

impl AddressParams {
    fn required(self) -> Result<String, ApiError> {
        match self.address {
            Some(a) if !a.trim().is_empty() => Ok(a),
            _ => Err(ApiError::BadRequest("missing address parameter".into())),
        }
    }
}

/// Error returned by handlers, rendered as `{"error": "..."}`.
pub enum ApiError {
    BadRequest(String),
    Index(IndexerError),
}

impl From<IndexerError> for ApiError {
    fn from(e: IndexerError) -> Self {
        Self::Index(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Index(e @ IndexerError::InvalidAddress(_)) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Index(e) => {
                tracing::error!(error = %e, "query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST]);

    Router::new()
        .route("/current-block", get(current_block))
        .route("/subscribe", post(subscribe))
        .route("/transactions", get(transactions))
        .route("/subscriptions", get(subscriptions))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn current_block(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "currentBlock": state.query.current_block() }))
}

async fn subscribe(
    State(state): State<AppState>,
    Query(params): Query<AddressParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let address = params.required()?;
    let subscribed = state.query.subscribe(&address).await?;
    if subscribed {
        tracing::info!(address = %address, "subscribed");
    }
    Ok(Json(json!({ "subscribed": subscribed })))
}

async fn transactions(
    State(state): State<AppState>,
    Query(params): Query<AddressParams>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let address = params.required()?;
    Ok(Json(state.query.transactions(&address).await?))
}

async fn subscriptions(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let addresses = state.query.subscribed_addresses().await?;
    Ok(Json(addresses.into_iter().collect()))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sync_state = *state.sync_state.borrow();
    Json(json!({
        "status": "ok",
        "state": sync_state.to_string(),
        "currentBlock": state.query.current_block(),
    }))
}
