//! Model Context Protocol dispatch over JSON-RPC 2.0.
//!
//! Transport-agnostic: [`McpServer::handle_message`] takes one raw message and
//! returns the response to write back, or `None` for notifications. Every
//! capability failure becomes an error-shaped [`Outcome`] inside a successful
//! JSON-RPC response; only protocol-level problems use JSON-RPC error codes.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::capability::{CapabilityKind, CapabilityRegistry, CapabilitySummary, Outcome};

/// MCP revision implemented by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC error codes.
pub mod codes {
    /// Invalid JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// Not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Unknown method.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
}

/// Incoming JSON-RPC request or notification.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Protocol marker, must be `"2.0"`.
    pub jsonrpc: String,
    /// Request ID; absent for notifications. An explicit `null` is still a
    /// request and is echoed back.
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Value,
}

/// Maps a present field to `Some`, even when its value is `null`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcError {
    /// Error code, see [`codes`].
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

/// Outgoing JSON-RPC response.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

impl Response {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Parse-error response for a body that is not JSON.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, codes::PARSE_ERROR, message)
    }

    /// The error object, if any.
    pub const fn rpc_error(&self) -> Option<&RpcError> {
        self.error.as_ref()
    }

    /// Serializes to a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ReadParams {
    uri: String,
}

/// Protocol front end over a frozen [`CapabilityRegistry`].
#[derive(Debug, Clone)]
pub struct McpServer {
    registry: Arc<CapabilityRegistry>,
}

impl McpServer {
    /// Creates a server over `registry`.
    pub const fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    pub const fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Handles one raw JSON message.
    pub async fn handle_message(&self, raw: &str) -> Option<Response> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                return Some(Response::error(
                    Value::Null,
                    codes::PARSE_ERROR,
                    format!("parse error: {e}"),
                ));
            }
        };
        self.handle_value(value).await
    }

    /// Handles one already-parsed JSON message.
    pub async fn handle_value(&self, value: Value) -> Option<Response> {
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: Request = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(Response::error(
                    id,
                    codes::INVALID_REQUEST,
                    format!("invalid request: {e}"),
                ));
            }
        };
        if request.jsonrpc != "2.0" {
            return Some(Response::error(
                id,
                codes::INVALID_REQUEST,
                "jsonrpc must be \"2.0\"",
            ));
        }
        self.handle(request).await
    }

    /// Dispatches a request. Notifications produce no response.
    pub async fn handle(&self, request: Request) -> Option<Response> {
        let Some(id) = request.id else {
            tracing::debug!(method = %request.method, "notification");
            return None;
        };
        tracing::debug!(method = %request.method, "request");
        let response = match self.dispatch(&request.method, request.params).await {
            Ok(result) => Response::result(id, result),
            Err((code, message)) => Response::error(id, code, message),
        };
        Some(response)
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, (i64, String)> {
        match method {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false },
                    "resources": { "subscribe": false, "listChanged": false },
                },
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({
                "tools": self
                    .registry
                    .list(CapabilityKind::Tool)
                    .iter()
                    .map(tool_entry)
                    .collect::<Vec<_>>(),
            })),
            "tools/call" => {
                let call: CallParams = parse_params(params)?;
                let outcome = Outcome::from(
                    self.registry
                        .invoke(CapabilityKind::Tool, &call.name, call.arguments)
                        .await,
                );
                Ok(tool_result(&outcome))
            }
            "resources/list" => Ok(json!({
                "resources": self
                    .resources()
                    .filter(|(_, templated)| !templated)
                    .map(|(summary, _)| resource_entry(summary, "uri"))
                    .collect::<Vec<_>>(),
            })),
            "resources/templates/list" => Ok(json!({
                "resourceTemplates": self
                    .resources()
                    .filter(|(_, templated)| *templated)
                    .map(|(summary, _)| resource_entry(summary, "uriTemplate"))
                    .collect::<Vec<_>>(),
            })),
            "resources/read" => {
                let read: ReadParams = parse_params(params)?;
                let outcome = Outcome::from(self.registry.read_resource(&read.uri).await);
                Ok(json!({
                    "contents": [{
                        "uri": read.uri,
                        "mimeType": "application/json",
                        "text": pretty(&outcome),
                    }],
                }))
            }
            other => Err((codes::METHOD_NOT_FOUND, format!("method not found: {other}"))),
        }
    }

    fn resources(&self) -> impl Iterator<Item = (CapabilitySummary, bool)> {
        self.registry
            .list(CapabilityKind::Resource)
            .into_iter()
            .map(|summary| {
                let templated = summary
                    .uri_template
                    .as_deref()
                    .is_some_and(|t| t.contains('{'));
                (summary, templated)
            })
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, (i64, String)> {
    serde_json::from_value(params).map_err(|e| (codes::INVALID_PARAMS, format!("invalid params: {e}")))
}

fn pretty(outcome: &Outcome) -> String {
    serde_json::to_string_pretty(outcome).unwrap_or_default()
}

fn tool_entry(summary: &CapabilitySummary) -> Value {
    json!({
        "name": summary.name,
        "description": summary.description,
        "inputSchema": summary.input_schema,
    })
}

fn resource_entry(summary: CapabilitySummary, uri_key: &str) -> Value {
    let mut entry = json!({
        "name": summary.name,
        "description": summary.description,
        "mimeType": "application/json",
    });
    if let (Some(object), Some(uri)) = (entry.as_object_mut(), summary.uri_template) {
        object.insert(uri_key.to_owned(), Value::String(uri));
    }
    entry
}

fn tool_result(outcome: &Outcome) -> Value {
    json!({
        "content": [{ "type": "text", "text": pretty(outcome) }],
        "structuredContent": outcome,
        "isError": outcome.is_error(),
    })
}


#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::testing::mock_server;
    use super::*;

    async fn call(server: &McpServer, message: Value) -> Value {
        server
            .handle_message(&message.to_string())
            .await
            .expect("response")
            .to_value()
    }

    #[tokio::test]
    async fn initialize_reports_protocol_and_server() {
        let (server, _) = mock_server();
        let response = call(&server, json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} })).await;
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(response["result"]["serverInfo"]["name"], "sonic-mcp");
    }

    #[tokio::test]
    async fn protocol_errors_use_json_rpc_codes() {
        let (server, _) = mock_server();
        let parse = server.handle_message("{not json").await.expect("response");
        assert_eq!(parse.rpc_error().map(|e| e.code), Some(codes::PARSE_ERROR));

        let shape = call(&server, json!({ "jsonrpc": "2.0", "id": 2 })).await;
        assert_eq!(shape["error"]["code"], codes::INVALID_REQUEST);
        assert_eq!(shape["id"], 2);

        let version = call(&server, json!({ "jsonrpc": "1.0", "id": 3, "method": "ping" })).await;
        assert_eq!(version["error"]["code"], codes::INVALID_REQUEST);

        let unknown = call(&server, json!({ "jsonrpc": "2.0", "id": "x", "method": "tools/delete" })).await;
        assert_eq!(unknown["error"]["code"], codes::METHOD_NOT_FOUND);
        assert_eq!(unknown["id"], "x");

        let params = call(&server, json!({ "jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {} })).await;
        assert_eq!(params["error"]["code"], codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let (server, _) = mock_server();
        let message = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        assert!(server.handle_message(&message.to_string()).await.is_none());
    }

    #[tokio::test]
    async fn null_id_is_a_request_not_a_notification() {
        let (server, _) = mock_server();
        let message = json!({ "jsonrpc": "2.0", "id": null, "method": "ping" });
        let response = server
            .handle_message(&message.to_string())
            .await
            .expect("response")
            .to_value();
        assert_eq!(response["id"], Value::Null);
        assert!(response.as_object().is_some_and(|o| o.contains_key("id")));
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn lists_tools_resources_and_templates() {
        let (server, _) = mock_server();
        let tools = call(&server, json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" })).await;
        assert_eq!(tools["result"]["tools"].as_array().map(Vec::len), Some(22));
        assert_eq!(tools["result"]["tools"][0]["inputSchema"]["type"], "object");

        let resources = call(&server, json!({ "jsonrpc": "2.0", "id": 2, "method": "resources/list" })).await;
        let templates =
            call(&server, json!({ "jsonrpc": "2.0", "id": 3, "method": "resources/templates/list" })).await;
        let fixed = resources["result"]["resources"].as_array().map(Vec::len).unwrap_or_default();
        let templated = templates["result"]["resourceTemplates"]
            .as_array()
            .map(Vec::len)
            .unwrap_or_default();
        assert_eq!(fixed, 3);
        assert_eq!(fixed + templated, 15);
        assert!(resources["result"]["resources"]
            .as_array()
            .is_some_and(|list| list.iter().any(|r| r["uri"] == "sonic://networks")));
    }

    #[tokio::test]
    async fn tool_failures_are_error_outcomes_not_rpc_errors() {
        let (server, _) = mock_server();
        let response = call(
            &server,
            json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "tools/call",
                "params": { "name": "get_balance", "arguments": { "address": "vitalik.eth" } },
            }),
        )
        .await;
        let result = &response["result"];
        assert_eq!(result["isError"], true);
        assert_eq!(result["structuredContent"]["status"], "error");
        assert_eq!(result["structuredContent"]["error"]["code"], "unsupported_address_format");

        let unknown = call(
            &server,
            json!({ "jsonrpc": "2.0", "id": 10, "method": "tools/call", "params": { "name": "swap" } }),
        )
        .await;
        assert_eq!(unknown["result"]["structuredContent"]["error"]["code"], "unknown_capability");
    }

    #[tokio::test]
    async fn tool_success_carries_text_and_structured_content() {
        let (server, connector) = mock_server();
        connector
            .asserter
            .push_success(&U256::from(5_000_000_000_000_000_u128));
        let response = call(
            &server,
            json!({
                "jsonrpc": "2.0",
                "id": 11,
                "method": "tools/call",
                "params": {
                    "name": "get_balance",
                    "arguments": { "address": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266" },
                },
            }),
        )
        .await;
        let result = &response["result"];
        assert_eq!(result["isError"], false);
        assert_eq!(result["structuredContent"]["data"]["formatted"], "0.005");
        let text = result["content"][0]["text"].as_str().unwrap_or_default();
        assert!(text.contains("\"success\""));
    }

    #[tokio::test]
    async fn resource_reads_wrap_outcomes_in_contents() {
        let (server, _) = mock_server();
        let response = call(
            &server,
            json!({ "jsonrpc": "2.0", "id": 12, "method": "resources/read", "params": { "uri": "sonic://networks" } }),
        )
        .await;
        let content = &response["result"]["contents"][0];
        assert_eq!(content["uri"], "sonic://networks");
        assert!(content["text"].as_str().is_some_and(|t| t.contains("mainnet")));
    }
}
