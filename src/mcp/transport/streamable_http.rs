//! Stateless session transport: one self-contained POST per exchange.
//!
//! No session state is kept between requests. The credential is read from the
//! request, the message is dispatched exactly once inside that scope, and the
//! reply is written either as one buffered JSON body or as a single SSE
//! `message` event. Dropping the request (client abort) drops the dispatch
//! future with it.

use super::{credential_from_headers, GatewayState};
use crate::core::credential::with_credential;
use crate::mcp::protocol;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

use super::event_stream::MESSAGE_EVENT;

pub async fn handle_post(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(err) => {
            debug!(%err, "Rejected malformed request body");
            return (StatusCode::BAD_REQUEST, Json(protocol::parse_error_reply())).into_response();
        }
    };
    let credential = credential_from_headers(&headers, &state.config.credential_header);

    if !protocol::expects_reply(&message) {
        with_credential(
            credential,
            protocol::handle_message(&state.dispatcher, message),
        )
        .await;
        return StatusCode::ACCEPTED.into_response();
    }

    if state.config.json_response {
        return match with_credential(
            credential,
            protocol::handle_message(&state.dispatcher, message),
        )
        .await
        {
            Some(reply) => Json(reply).into_response(),
            None => StatusCode::ACCEPTED.into_response(),
        };
    }

    // The body is produced after the handler returns, so the dispatch is
    // tracked separately from the request.
    let dispatcher = Arc::clone(&state.dispatcher);
    let reply = state.lifespan.track(with_credential(credential, async move {
        protocol::handle_message(&dispatcher, message).await
    }));
    let events = stream::once(reply).filter_map(|reply| async move {
        reply.map(|reply| {
            Ok::<_, Infallible>(
                Event::default()
                    .event(MESSAGE_EVENT)
                    .data(reply.to_string()),
            )
        })
    });
    Sse::new(events).into_response()
}
