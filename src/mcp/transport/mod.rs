//! HTTP surface of the gateway.
//!
//! Both transports share one [`GatewayState`] and one router. Every request
//! passes the admission layer first: it is refused with `503` unless the
//! lifespan is accepting, and is otherwise tracked so shutdown can drain it.
//! Each adapter extracts the caller's credential from the configured header
//! and opens the credential scope before anything reaches the dispatcher.

use crate::core::config::TransportConfig;
use crate::core::credential::Credential;
use crate::core::lifespan::Lifespan;
use crate::dispatch::Dispatcher;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

pub mod event_stream;
pub mod streamable_http;

pub use event_stream::SessionRegistry;

pub use crate::core::config::defaults::HEALTH_PATH;
pub const ACCESS_TOKEN_FIELD: &str = "access_token";

#[derive(Clone)]
pub struct GatewayState {
    pub dispatcher: Arc<Dispatcher>,
    pub lifespan: Lifespan,
    pub sessions: SessionRegistry,
    pub config: Arc<TransportConfig>,
}

impl GatewayState {
    pub fn new(dispatcher: Arc<Dispatcher>, lifespan: Lifespan, config: TransportConfig) -> Self {
        Self {
            dispatcher,
            lifespan,
            sessions: SessionRegistry::default(),
            config: Arc::new(config),
        }
    }
}

#[derive(Debug)]
pub enum ServeError {
    Bind { address: String, source: io::Error },
    Io(io::Error),
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeError::Bind { address, source } => {
                write!(f, "Failed to bind {address}: {source}")
            }
            ServeError::Io(source) => write!(f, "Server error: {source}"),
        }
    }
}

impl StdError for ServeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ServeError::Bind { source, .. } | ServeError::Io(source) => Some(source),
        }
    }
}

pub fn router(state: GatewayState) -> Router {
    let config = Arc::clone(&state.config);
    Router::new()
        .route(&config.sse_path, get(event_stream::open_stream))
        .route(&config.messages_path, post(event_stream::post_message))
        .route(&config.mcp_path, post(streamable_http::handle_post))
        .route(HEALTH_PATH, get(healthz))
        .layer(middleware::from_fn_with_state(
            state.lifespan.clone(),
            admission,
        ))
        .with_state(state)
}

pub async fn bind(address: &str) -> Result<TcpListener, ServeError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| ServeError::Bind {
            address: address.to_string(),
            source,
        })
}

/// Serves the gateway on `listener` until `shutdown` resolves, then lets open
/// connections finish.
pub async fn serve<S>(listener: TcpListener, state: GatewayState, shutdown: S) -> Result<(), ServeError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr().map_err(ServeError::Io)?;
    info!(%address, operations = state.dispatcher.catalog().len(), "Gateway listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServeError::Io)
}

async fn admission(State(lifespan): State<Lifespan>, request: Request, next: Next) -> Response {
    if !lifespan.is_accepting() {
        debug!(path = %request.uri().path(), "Refusing request outside the serving window");
        return (StatusCode::SERVICE_UNAVAILABLE, "Server is not accepting requests")
            .into_response();
    }
    lifespan.track(next.run(request)).await
}

async fn healthz(State(state): State<GatewayState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "operations": state.dispatcher.catalog().len(),
        "sessions": state.sessions.len(),
    }))
}

/// Reads the caller's credential from `header`. A missing or unreadable
/// header yields the empty credential.
pub fn credential_from_headers(headers: &HeaderMap, header: &str) -> Credential {
    headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .map(decode_auth_data)
        .unwrap_or_default()
}

/// Decodes a base64 JSON object and takes its `access_token` string.
/// Anything else yields the empty credential.
pub fn decode_auth_data(raw: &str) -> Credential {
    let Ok(bytes) = STANDARD.decode(raw.trim()) else {
        debug!("Credential header is not valid base64");
        return Credential::empty();
    };
    let Ok(Value::Object(object)) = serde_json::from_slice::<Value>(&bytes) else {
        debug!("Credential header is not a JSON object");
        return Credential::empty();
    };
    match object.get(ACCESS_TOKEN_FIELD) {
        Some(Value::String(token)) => Credential::new(token.as_str()),
        _ => Credential::empty(),
    }
}
