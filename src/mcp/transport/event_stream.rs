//! Event-stream transport: one long-lived SSE channel per session.
//!
//! `GET {sse_path}` opens a session. The first event (`endpoint`) names the
//! side-channel URL; the client then POSTs JSON-RPC frames to
//! `{messages_path}?session_id=<id>` and receives every reply as a `message`
//! event on the stream. The credential is read once, when the stream opens,
//! and stays bound for the whole session.
//!
//! Closing the stream (client disconnect) removes the session and aborts its
//! in-flight calls. Server shutdown instead stops intake, lets in-flight calls
//! finish, and then ends the stream.

use super::{credential_from_headers, GatewayState};
use crate::core::credential::{self, with_credential};
use crate::dispatch::Dispatcher;
use crate::mcp::protocol;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const ENDPOINT_EVENT: &str = "endpoint";
pub const MESSAGE_EVENT: &str = "message";
const SESSION_ID_BYTES: usize = 16;

/// Open event-stream sessions, keyed by session id.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<String, mpsc::Sender<Value>>>>,
}

impl SessionRegistry {
    fn insert(&self, session_id: String, sender: mpsc::Sender<Value>) {
        if let Ok(mut sessions) = self.inner.lock() {
            sessions.insert(session_id, sender);
        }
    }

    fn remove(&self, session_id: &str) {
        if let Ok(mut sessions) = self.inner.lock() {
            sessions.remove(session_id);
        }
    }

    fn sender(&self, session_id: &str) -> Option<mpsc::Sender<Value>> {
        self.inner
            .lock()
            .ok()
            .and_then(|sessions| sessions.get(session_id).cloned())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.inner
            .lock()
            .map(|sessions| sessions.contains_key(session_id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owned by the outgoing stream; dropping it closes the session.
struct SessionGuard {
    session_id: String,
    sessions: SessionRegistry,
    closed: CancellationToken,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.remove(&self.session_id);
        self.closed.cancel();
        debug!(session_id = %self.session_id, "Event-stream session closed");
    }
}

pub fn mint_session_id() -> Result<String, String> {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    getrandom::fill(&mut bytes).map_err(|err| err.to_string())?;
    Ok(bytes.iter().map(|byte| format!("{byte:02x}")).collect())
}

pub async fn open_stream(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    let credential = credential_from_headers(&headers, &state.config.credential_header);
    let session_id = match mint_session_id() {
        Ok(session_id) => session_id,
        Err(err) => {
            warn!(%err, "Failed to mint session id");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to open session").into_response();
        }
    };

    let depth = state.config.session_queue_depth.max(1);
    let (inbound_tx, inbound_rx) = mpsc::channel(depth);
    let (outbound_tx, outbound_rx) = mpsc::channel(depth);
    let closed = CancellationToken::new();
    state.sessions.insert(session_id.clone(), inbound_tx);

    let guard = SessionGuard {
        session_id: session_id.clone(),
        sessions: state.sessions.clone(),
        closed: closed.clone(),
    };

    info!(
        session_id = %session_id,
        authenticated = !credential.is_empty(),
        "Event-stream session opened"
    );

    let worker = run_session(
        Arc::clone(&state.dispatcher),
        inbound_rx,
        outbound_tx,
        closed,
        state.lifespan.shutdown_token(),
    );
    tokio::spawn(state.lifespan.track(with_credential(credential, worker)));

    let endpoint = Event::default()
        .event(ENDPOINT_EVENT)
        .data(format!("{}?session_id={}", state.config.messages_path, session_id));
    let messages = stream::unfold((outbound_rx, guard), |(mut outbound, guard)| async move {
        let message = outbound.recv().await?;
        let event = Event::default()
            .event(MESSAGE_EVENT)
            .data(message.to_string());
        Some((Ok::<_, Infallible>(event), (outbound, guard)))
    });
    let events = stream::once(async move { Ok::<_, Infallible>(endpoint) }).chain(messages);

    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(state.config.keep_alive()))
        .into_response()
}

/// Runs inside the session's credential scope until the session closes or
/// the server shuts down. Each call is spawned with the session credential
/// re-bound, so calls on one session may overlap.
pub async fn run_session(
    dispatcher: Arc<Dispatcher>,
    mut inbound: mpsc::Receiver<Value>,
    outbound: mpsc::Sender<Value>,
    closed: CancellationToken,
    shutdown: CancellationToken,
) {
    let mut calls = JoinSet::new();

    loop {
        tokio::select! {
            _ = closed.cancelled() => {
                if !calls.is_empty() {
                    debug!(in_flight = calls.len(), "Aborting calls for closed session");
                }
                calls.abort_all();
                return;
            }
            _ = shutdown.cancelled() => break,
            message = inbound.recv() => {
                let Some(message) = message else {
                    calls.abort_all();
                    return;
                };
                spawn_call(&mut calls, &dispatcher, &outbound, message);
            }
            Some(joined) = calls.join_next(), if !calls.is_empty() => {
                if let Err(err) = joined {
                    if err.is_panic() {
                        warn!("Session call task panicked");
                    }
                }
            }
        }
    }

    // Shutdown: no new intake. Messages already accepted still get answered.
    inbound.close();
    let mut queued = 0usize;
    while let Ok(message) = inbound.try_recv() {
        spawn_call(&mut calls, &dispatcher, &outbound, message);
        queued += 1;
    }
    if queued > 0 {
        debug!(queued, "Dispatching queued messages before drain");
    }
    loop {
        tokio::select! {
            _ = closed.cancelled() => {
                calls.abort_all();
                return;
            }
            joined = calls.join_next() => {
                if joined.is_none() {
                    return;
                }
            }
        }
    }
}

/// Spawns one message under the current (session) credential.
fn spawn_call(
    calls: &mut JoinSet<()>,
    dispatcher: &Arc<Dispatcher>,
    outbound: &mpsc::Sender<Value>,
    message: Value,
) {
    let dispatcher = Arc::clone(dispatcher);
    let outbound = outbound.clone();
    calls.spawn(with_credential(credential::current(), async move {
        if let Some(reply) = protocol::handle_message(&dispatcher, message).await {
            if outbound.send(reply).await.is_err() {
                debug!("Session stream closed before reply was delivered");
            }
        }
    }));
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn post_message(
    State(state): State<GatewayState>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Response {
    let Some(session_id) = query.session_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing session_id").into_response();
    };
    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(err) => {
            debug!(session_id = %session_id, %err, "Rejected malformed message body");
            return (StatusCode::BAD_REQUEST, "Invalid JSON-RPC message").into_response();
        }
    };
    let Some(sender) = state.sessions.sender(&session_id) else {
        return (StatusCode::NOT_FOUND, "Unknown session").into_response();
    };
    if sender.send(message).await.is_err() {
        return (StatusCode::NOT_FOUND, "Unknown session").into_response();
    }
    (StatusCode::ACCEPTED, "Accepted").into_response()
}
