//! MCP method routing on top of the adapter registry.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use ssg_mcp::{
    CallToolParams, CallToolResult, InitializeResult, JsonRpcError, JsonRpcMessage, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, McpServerInfo, PROTOCOL_VERSION,
};
use ssg_transport::MessageHandler;

use crate::registry::AdapterRegistry;

/// Implements the transport's message-handler contract over the fleet.
///
/// User-facing failures (unknown method, bad params, unknown tool) become
/// inline JSON-RPC error responses; only invocation breakage inside an
/// adapter surfaces as a tool-level `is_error` result. Nothing here returns
/// `Err`, so the dispatcher never feeds the transport's circuit breaker.
pub struct GatewayDispatcher {
    registry: Arc<AdapterRegistry>,
    server_info: McpServerInfo,
}

impl GatewayDispatcher {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self {
            registry,
            server_info: McpServerInfo {
                name: "ssg-gateway".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    fn initialize(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: serde_json::json!({"tools": {"listChanged": false}}),
            server_info: self.server_info.clone(),
            instructions: None,
        };
        JsonRpcResponse::ok(
            request.id.clone(),
            serde_json::to_value(result).unwrap_or(Value::Null),
        )
    }

    fn list_tools(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let result = ListToolsResult {
            tools: self.registry.tools(),
            next_cursor: None,
        };
        JsonRpcResponse::ok(
            request.id.clone(),
            serde_json::to_value(result).unwrap_or(Value::Null),
        )
    }

    async fn call_tool(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let params: CallToolParams = match request
            .params
            .clone()
            .map(serde_json::from_value)
            .transpose()
        {
            Ok(Some(p)) => p,
            Ok(None) | Err(_) => {
                return invalid_params(request, "tools/call requires a tool name");
            }
        };

        match self.registry.call(&params.name, params.arguments).await {
            Some(Ok(result)) => JsonRpcResponse::ok(
                request.id.clone(),
                serde_json::to_value(result).unwrap_or(Value::Null),
            ),
            Some(Err(e)) => {
                debug!(tool = %params.name, error = %e, "tool invocation failed");
                let result = CallToolResult::error(e.to_string());
                JsonRpcResponse::ok(
                    request.id.clone(),
                    serde_json::to_value(result).unwrap_or(Value::Null),
                )
            }
            None => invalid_params(request, &format!("Unknown tool: {}", params.name)),
        }
    }
}

fn invalid_params(request: &JsonRpcRequest, message: &str) -> JsonRpcResponse {
    JsonRpcResponse::err(
        request.id.clone(),
        JsonRpcError {
            code: -32602,
            message: message.to_string(),
            data: None,
        },
    )
}

#[async_trait]
impl MessageHandler for GatewayDispatcher {
    async fn handle(&self, message: JsonRpcMessage) -> anyhow::Result<Option<JsonRpcResponse>> {
        let request = match message {
            JsonRpcMessage::Request(request) => request,
            JsonRpcMessage::Notification(n) => {
                debug!(method = %n.method, "notification received");
                return Ok(None);
            }
            JsonRpcMessage::Response(_) => return Ok(None),
        };

        let response = match request.method.as_str() {
            "initialize" => self.initialize(&request),
            "ping" => JsonRpcResponse::ok(request.id.clone(), serde_json::json!({})),
            "tools/list" => self.list_tools(&request),
            "tools/call" => self.call_tool(&request).await,
            other => JsonRpcResponse::err(
                request.id.clone(),
                JsonRpcError {
                    code: -32601,
                    message: format!("Method not found: {other}"),
                    data: None,
                },
            ),
        };
        Ok(Some(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandAdapter;
    use ssg_mcp::JsonRpcId;

    async fn dispatcher() -> GatewayDispatcher {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(
            CommandAdapter::new("echoer", "echo")
                .with_language("Shell")
                .with_tool("hello", "say hello", vec!["hello"]),
        ));
        registry.connect_all().await;
        GatewayDispatcher::new(Arc::new(registry))
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcMessage {
        JsonRpcMessage::Request(JsonRpcRequest::new(JsonRpcId::Number(1), method, params))
    }

    #[tokio::test]
    async fn initialize_reports_protocol_and_server_info() {
        let d = dispatcher().await;
        let response = d
            .handle(request("initialize", Some(serde_json::json!({}))))
            .await
            .unwrap()
            .expect("response");
        let result = response.result.expect("result");
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "ssg-gateway");
    }

    #[tokio::test]
    async fn tools_list_returns_namespaced_tools() {
        let d = dispatcher().await;
        let response = d
            .handle(request("tools/list", None))
            .await
            .unwrap()
            .expect("response");
        let result = response.result.expect("result");
        assert_eq!(result["tools"][0]["name"], "echoer:hello");
    }

    #[tokio::test]
    async fn tools_call_runs_the_adapter() {
        let d = dispatcher().await;
        let response = d
            .handle(request(
                "tools/call",
                Some(serde_json::json!({"name": "echoer:hello"})),
            ))
            .await
            .unwrap()
            .expect("response");
        let result = response.result.expect("result");
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["text"], "hello");
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let d = dispatcher().await;
        let response = d
            .handle(request(
                "tools/call",
                Some(serde_json::json!({"name": "hugo:build"})),
            ))
            .await
            .unwrap()
            .expect("response");
        let error = response.error.expect("error");
        assert_eq!(error.code, -32602);
        assert!(error.message.contains("hugo:build"));
    }

    #[tokio::test]
    async fn missing_params_are_invalid() {
        let d = dispatcher().await;
        let response = d
            .handle(request("tools/call", None))
            .await
            .unwrap()
            .expect("response");
        assert_eq!(response.error.expect("error").code, -32602);
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let d = dispatcher().await;
        let response = d
            .handle(request("resources/list", None))
            .await
            .unwrap()
            .expect("response");
        let error = response.error.expect("error");
        assert_eq!(error.code, -32601);
        assert!(error.message.contains("resources/list"));
    }

    #[tokio::test]
    async fn ping_and_notifications() {
        let d = dispatcher().await;
        let pong = d.handle(request("ping", None)).await.unwrap().expect("response");
        assert_eq!(pong.result, Some(serde_json::json!({})));

        let none = d
            .handle(JsonRpcMessage::Notification(
                ssg_mcp::JsonRpcNotification::new("notifications/initialized", None),
            ))
            .await
            .unwrap();
        assert!(none.is_none());
    }
}
