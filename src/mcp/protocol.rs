//! JSON-RPC framing shared by both transports.
//!
//! Inbound frames are parsed loosely (method string plus raw params) and
//! routed by method name; typed params come from `rust_mcp_schema`. Every
//! `tools/call` outcome, including sanitized failures, is a JSON-RPC
//! *result*; JSON-RPC errors are reserved for framing problems.

use crate::dispatch::{CallEnvelope, Dispatcher};
use rust_mcp_schema::{CallToolRequestParams, RequestId, RpcError, LATEST_PROTOCOL_VERSION};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

pub const JSONRPC_VERSION: &str = "2.0";
pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_PING: &str = "ping";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";
pub const NOTIFICATION_PREFIX: &str = "notifications/";

/// Protocol revisions this gateway will echo back during `initialize`.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] =
    &["2024-11-05", "2025-03-26", "2025-06-18", "2025-11-25"];

/// JSON-RPC code for frames that are not valid JSON.
pub const PARSE_ERROR: i64 = -32700;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcFrame {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcFrame {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum ReplyBody {
    Result(Value),
    Error(RpcError),
}

#[derive(Debug, Serialize)]
struct JsonRpcReply {
    jsonrpc: &'static str,
    id: Option<RequestId>,
    #[serde(flatten)]
    body: ReplyBody,
}

pub fn result_reply(id: Option<RequestId>, result: Value) -> Value {
    reply_value(JsonRpcReply {
        jsonrpc: JSONRPC_VERSION,
        id,
        body: ReplyBody::Result(result),
    })
}

pub fn error_reply(id: Option<RequestId>, error: RpcError) -> Value {
    reply_value(JsonRpcReply {
        jsonrpc: JSONRPC_VERSION,
        id,
        body: ReplyBody::Error(error),
    })
}

pub fn parse_error_reply() -> Value {
    error_reply(
        None,
        RpcError {
            code: PARSE_ERROR,
            message: "Parse error".to_string(),
            data: None,
        },
    )
}

fn reply_value(reply: JsonRpcReply) -> Value {
    serde_json::to_value(&reply).unwrap_or_else(|_| {
        json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": Value::Null,
            "error": { "code": -32603, "message": "Internal error" }
        })
    })
}

/// True when `message` contains at least one request that needs a reply.
pub fn expects_reply(message: &Value) -> bool {
    match message {
        Value::Array(items) => items.iter().any(expects_reply),
        Value::Object(object) => {
            object.contains_key("method") && object.get("id").is_some_and(|id| !id.is_null())
        }
        _ => true,
    }
}

/// Handles one inbound JSON-RPC message (single frame or batch).
///
/// Returns `None` when nothing needs to be sent back, e.g. for
/// notifications. Must run inside the caller's credential scope.
pub async fn handle_message(dispatcher: &Dispatcher, message: Value) -> Option<Value> {
    match message {
        Value::Array(items) if items.is_empty() => Some(error_reply(
            None,
            RpcError::invalid_request().with_message("Empty batch"),
        )),
        Value::Array(items) => {
            let mut replies = Vec::new();
            for item in items {
                if let Some(reply) = handle_frame(dispatcher, item).await {
                    replies.push(reply);
                }
            }
            (!replies.is_empty()).then_some(Value::Array(replies))
        }
        single => handle_frame(dispatcher, single).await,
    }
}

async fn handle_frame(dispatcher: &Dispatcher, raw: Value) -> Option<Value> {
    // Client responses need no acknowledgement; this server never asks.
    if let Value::Object(object) = &raw {
        if !object.contains_key("method")
            && (object.contains_key("result") || object.contains_key("error"))
        {
            return None;
        }
    }

    let frame = match serde_json::from_value::<JsonRpcFrame>(raw) {
        Ok(frame) => frame,
        Err(err) => {
            debug!(%err, "Rejected malformed JSON-RPC frame");
            return Some(error_reply(
                None,
                RpcError::invalid_request().with_message("Invalid JSON-RPC request"),
            ));
        }
    };

    if frame.is_notification() {
        debug!(method = %frame.method, "Received notification");
        return None;
    }
    if frame.method.starts_with(NOTIFICATION_PREFIX) {
        return None;
    }

    let JsonRpcFrame {
        id, method, params, ..
    } = frame;
    let outcome = match method.as_str() {
        METHOD_INITIALIZE => Ok(initialize_result(dispatcher, params.as_ref())),
        METHOD_PING => Ok(json!({})),
        METHOD_TOOLS_LIST => tools_list_result(dispatcher),
        METHOD_TOOLS_CALL => tools_call_result(dispatcher, params).await,
        other => {
            debug!(method = %other, "Unsupported method");
            Err(RpcError::method_not_found().with_message(&format!("Method not found: {other}")))
        }
    };

    Some(match outcome {
        Ok(result) => result_reply(id, result),
        Err(error) => error_reply(id, error),
    })
}

/// Echoes the client's protocol version when supported, otherwise offers
/// the latest revision.
pub fn negotiate_protocol_version(requested: Option<&str>) -> String {
    match requested {
        Some(version) if SUPPORTED_PROTOCOL_VERSIONS.contains(&version) => version.to_string(),
        _ => LATEST_PROTOCOL_VERSION.to_string(),
    }
}

fn initialize_result(dispatcher: &Dispatcher, params: Option<&Value>) -> Value {
    let requested = params
        .and_then(|params| params.get("protocolVersion"))
        .and_then(Value::as_str);
    let info = dispatcher.server_info();
    json!({
        "protocolVersion": negotiate_protocol_version(requested),
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": info.name, "version": info.version },
    })
}

fn tools_list_result(dispatcher: &Dispatcher) -> Result<Value, RpcError> {
    let tools = serde_json::to_value(dispatcher.advertised_tools())
        .map_err(|err| RpcError::internal_error().with_message(&err.to_string()))?;
    Ok(json!({ "tools": tools }))
}

async fn tools_call_result(
    dispatcher: &Dispatcher,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    let params = params.ok_or_else(|| RpcError::invalid_params().with_message("Missing params"))?;
    let params: CallToolRequestParams = serde_json::from_value(params)
        .map_err(|_| RpcError::invalid_params().with_message("Invalid tools/call params"))?;

    let call = CallEnvelope::new(params.name, params.arguments.unwrap_or_else(Map::new));
    let result = dispatcher.invoke(call).await.into_call_tool_result();
    serde_json::to_value(result)
        .map_err(|err| RpcError::internal_error().with_message(&err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{handler_fn, Catalog, OperationDescriptor, ToolError};
    use crate::core::credential::{with_credential, Credential};
    use std::sync::Arc;

    fn dispatcher() -> Dispatcher {
        let mut catalog = Catalog::new();
        catalog
            .register(
                OperationDescriptor::new(
                    "echo",
                    json!({
                        "type": "object",
                        "properties": { "text": { "type": "string" } },
                        "required": ["text"]
                    }),
                )
                .with_description("Echo text back"),
                handler_fn(|args, _ctx| async move {
                    Ok::<_, ToolError>(args.get("text").cloned().unwrap_or(Value::Null))
                }),
            )
            .unwrap();
        Dispatcher::new(Arc::new(catalog))
    }

    async fn handle(message: Value) -> Option<Value> {
        let dispatcher = dispatcher();
        with_credential(Credential::new("T1"), handle_message(&dispatcher, message)).await
    }

    #[tokio::test]
    async fn initialize_negotiates_supported_version() {
        let reply = handle(json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "0"}
            }
        }))
        .await
        .unwrap();

        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(reply["result"]["serverInfo"]["name"], "switchboard");
        assert!(reply["result"]["capabilities"]["tools"].is_object());
    }

    #[test]
    fn unknown_protocol_version_falls_back_to_latest() {
        assert_eq!(
            negotiate_protocol_version(Some("1999-01-01")),
            LATEST_PROTOCOL_VERSION
        );
        assert_eq!(negotiate_protocol_version(None), LATEST_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn tools_list_advertises_catalog() {
        let reply = handle(json!({"jsonrpc": "2.0", "id": "a", "method": "tools/list"}))
            .await
            .unwrap();
        assert_eq!(reply["id"], "a");
        let tools = reply["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "echo");
        assert_eq!(tools[0]["description"], "Echo text back");
    }

    #[tokio::test]
    async fn tools_call_returns_text_content() {
        let reply = handle(json!({
            "jsonrpc": "2.0", "id": 7, "method": "tools/call",
            "params": {"name": "echo", "arguments": {"text": "hi"}}
        }))
        .await
        .unwrap();
        assert_eq!(reply["result"]["content"][0]["type"], "text");
        assert_eq!(reply["result"]["content"][0]["text"], "hi");
        assert!(reply.get("error").is_none());
    }

    #[tokio::test]
    async fn unknown_operation_is_a_result_not_a_protocol_error() {
        let reply = handle(json!({
            "jsonrpc": "2.0", "id": 8, "method": "tools/call",
            "params": {"name": "does_not_exist", "arguments": {}}
        }))
        .await
        .unwrap();
        assert!(reply.get("error").is_none());
        assert_eq!(reply["result"]["isError"], true);
        let body: Value =
            serde_json::from_str(reply["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(body["error"]["code"], "UNKNOWN_OPERATION");
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        assert!(handle(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let reply = handle(json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"}))
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn missing_params_is_invalid_params() {
        let reply = handle(json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call"}))
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn batches_reply_per_request() {
        let reply = handle(json!([
            {"jsonrpc": "2.0", "id": 1, "method": "ping"},
            {"jsonrpc": "2.0", "method": "notifications/initialized"},
            {"jsonrpc": "2.0", "id": 2, "method": "tools/list"}
        ]))
        .await
        .unwrap();
        let replies = reply.as_array().unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[1]["id"], 2);
    }

    #[test]
    fn expects_reply_distinguishes_requests_from_notifications() {
        assert!(expects_reply(&json!({"id": 1, "method": "ping"})));
        assert!(!expects_reply(&json!({"method": "notifications/initialized"})));
        assert!(!expects_reply(&json!({"id": 1, "result": {}})));
        assert!(expects_reply(&json!([{"method": "x"}, {"id": 2, "method": "y"}])));
        assert!(!expects_reply(&json!([{"method": "x"}])));
    }

    #[test]
    fn parse_error_reply_has_null_id() {
        let reply = parse_error_reply();
        assert_eq!(reply["id"], Value::Null);
        assert_eq!(reply["error"]["code"], PARSE_ERROR);
    }
}
