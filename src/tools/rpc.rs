use super::{catalog, ToolDispatcher};
use crate::{middleware_helpers::Actor, AppState};
use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2025-03-26";
pub const SESSION_HEADER: &str = "mcp-session-id";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Option<String>,
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

fn text_content(text: String, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}

/// Handles one JSON-RPC message. Returns the response and whether it opened
/// a session.
async fn handle(dispatcher: &ToolDispatcher, request: JsonRpcRequest, actor: &Actor) -> (JsonRpcResponse, bool) {
    let id = request.id;
    if request.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
        return (
            JsonRpcResponse::error(id, INVALID_REQUEST, "Invalid JSON-RPC version"),
            false,
        );
    }
    let Some(method) = request.method else {
        return (JsonRpcResponse::error(id, INVALID_REQUEST, "Missing method"), false);
    };
    debug!(%method, "json-rpc request");

    match method.as_str() {
        "initialize" => (
            JsonRpcResponse::result(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            true,
        ),
        "ping" => (JsonRpcResponse::result(id, json!({})), false),
        "tools/list" => (JsonRpcResponse::result(id, json!({ "tools": catalog() })), false),
        "tools/call" => {
            let params: CallParams = match serde_json::from_value(request.params) {
                Ok(params) => params,
                Err(e) => {
                    return (
                        JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e)),
                        false,
                    )
                }
            };
            let Some(tool) = ToolDispatcher::resolve(&params.name) else {
                return (
                    JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Unknown tool: {}", params.name)),
                    false,
                );
            };

            let result = match dispatcher.call(tool, params.arguments, actor).await {
                Ok(value) => {
                    let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
                    let mut result = text_content(text, false);
                    result["structuredContent"] = value;
                    result
                }
                Err(err) => {
                    if err.status_code().is_server_error() {
                        warn!(tool = %tool, error = %err, "tool failed with internal error");
                    }
                    text_content(err.to_payload().to_string(), true)
                }
            };
            (JsonRpcResponse::result(id, result), false)
        }
        other => (
            JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Unknown method: {}", other)),
            false,
        ),
    }
}

/// `POST /mcp`: JSON-RPC 2.0 tool endpoint.
pub async fn mcp_endpoint(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Bytes,
) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice::<Value>(&body) {
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("Parse error: {}", e))),
            )
                .into_response()
        }
        Ok(value) => {
            let id = value.get("id").cloned().unwrap_or(Value::Null);
            match serde_json::from_value(value) {
                Ok(request) => request,
                Err(_) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(JsonRpcResponse::error(id, INVALID_REQUEST, "Invalid request")),
                    )
                        .into_response()
                }
            }
        }
    };

    let (response, opened_session) = handle(&state.tools, request, &actor).await;
    let status = match &response.error {
        Some(error) if error.code == INVALID_REQUEST => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    };

    let mut http_response = (status, Json(response)).into_response();
    if opened_session {
        if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            http_response
                .headers_mut()
                .insert(HeaderName::from_static(SESSION_HEADER), value);
        }
    }
    http_response
}
