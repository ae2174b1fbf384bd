//! MCP server implementation.
//!
//! This module provides the JSON-RPC dispatcher that routes tool calls and
//! resource reads to the Metabase operation handlers, and the stdio
//! transport loop.

use std::sync::Arc;

use metabase_core::config::{McpConfig, Transport};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::api::MetabaseApi;
use crate::error::McpError;
use crate::http_transport::HttpServer;
use crate::protocol::*;
use crate::resources::{self, JSON_MIME_TYPE, ResourceAddress};
use crate::tools::ToolRegistry;

/// The MCP server.
#[derive(Clone)]
pub struct McpServer {
    config: McpConfig,
    api: Arc<MetabaseApi>,
    tools: Arc<ToolRegistry>,
}

impl McpServer {
    /// Create a server exposing the built-in Metabase tools.
    pub fn new(config: McpConfig, api: MetabaseApi) -> Self {
        let tools = ToolRegistry::builtin();
        tracing::info!(tool_count = tools.len(), "Registered Metabase tools");

        Self {
            config,
            api: Arc::new(api),
            tools: Arc::new(tools),
        }
    }

    pub fn config(&self) -> &McpConfig {
        &self.config
    }

    pub fn api(&self) -> &MetabaseApi {
        &self.api
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Start the MCP server.
    pub async fn run(&self) -> Result<(), McpError> {
        match self.config.transport {
            Transport::Stdio => self.run_stdio().await,
            Transport::Http => self.run_http().await,
        }
    }

    /// Run the server with stdio transport.
    ///
    /// Every request line is handled on its own task; responses are written
    /// in completion order by a single writer.
    async fn run_stdio(&self) -> Result<(), McpError> {
        tracing::info!("Starting MCP server with stdio transport");

        let (response_tx, mut response_rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(line) = response_rx.recv().await {
                stdout.write_all(line.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut in_flight = JoinSet::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let server = self.clone();
            let response_tx = response_tx.clone();
            in_flight.spawn(async move {
                let Some(response) = server.handle_message(&line).await else {
                    return;
                };
                match serde_json::to_string(&response) {
                    Ok(json) => {
                        let _ = response_tx.send(json);
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to serialize response"),
                }
            });

            while let Some(finished) = in_flight.try_join_next() {
                log_join_error(finished);
            }
        }

        tracing::info!("stdin closed, waiting for in-flight requests");
        while let Some(finished) = in_flight.join_next().await {
            log_join_error(finished);
        }

        drop(response_tx);
        writer.await.map_err(|e| McpError::Internal(e.into()))??;
        Ok(())
    }

    /// Run the server with HTTP transport.
    pub async fn run_http(&self) -> Result<(), McpError> {
        HttpServer::new(self.config.bind_addr(), self.clone())
            .run()
            .await
    }

    /// Handle one raw JSON-RPC message.
    ///
    /// Returns `None` for notifications, which never get a response.
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(raw) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Received unparsable JSON-RPC message");
                return Some(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            }
        };

        if request.is_notification() {
            tracing::debug!(method = %request.method, "Received notification");
            return None;
        }

        Some(self.handle_request(request).await)
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            "resources/list" => JsonRpcResponse::success(id, json!({ "resources": [] })),
            "resources/templates/list" => self.handle_list_resource_templates(id),
            "resources/read" => self.handle_read_resource(id, request.params).await,
            "shutdown" => self.handle_shutdown(id),
            _ => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": "metabase-mcp",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {
                    "listChanged": false
                },
                "resources": {
                    "subscribe": false,
                    "listChanged": false
                }
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let response = ListToolsResponse {
            tools: self.tools.list().into_iter().cloned().collect(),
        };
        to_response(id, &response)
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match parse_params(params) {
            Ok(params) => params,
            Err(e) => return JsonRpcResponse::error(id, e.code(), e.to_string()),
        };

        let Some(tool) = self.tools.get(&params.name) else {
            let err = McpError::ToolNotFound { name: params.name };
            return JsonRpcResponse::error(id, err.code(), err.to_string());
        };

        tracing::info!(tool = %params.name, "Calling tool");

        match tool.call(&self.api, params.arguments).await {
            Ok(text) => to_response(id, &CallToolResponse::text(text)),
            Err(McpError::Metabase(e)) => {
                tracing::warn!(tool = %params.name, kind = e.kind().as_str(), error = %e, "Tool call failed");
                to_response(id, &CallToolResponse::failure(e.to_string()))
            }
            Err(e) => JsonRpcResponse::error(id, e.code(), e.to_string()),
        }
    }

    fn handle_list_resource_templates(&self, id: Option<Value>) -> JsonRpcResponse {
        let response = ListResourceTemplatesResponse {
            resource_templates: resources::templates(),
        };
        to_response(id, &response)
    }

    async fn handle_read_resource(
        &self,
        id: Option<Value>,
        params: Option<Value>,
    ) -> JsonRpcResponse {
        let params: ReadResourceParams = match parse_params(params) {
            Ok(params) => params,
            Err(e) => return JsonRpcResponse::error(id, e.code(), e.to_string()),
        };

        let Some(address) = ResourceAddress::parse(&params.uri) else {
            let err = McpError::ResourceNotFound { uri: params.uri };
            return JsonRpcResponse::error(id, err.code(), err.to_string());
        };

        tracing::info!(uri = %address, "Reading resource");

        match address.read(&self.api).await {
            Ok(text) => to_response(
                id,
                &ReadResourceResponse {
                    contents: vec![ResourceContents {
                        uri: params.uri,
                        mime_type: Some(JSON_MIME_TYPE.to_string()),
                        text,
                    }],
                },
            ),
            Err(e) => {
                tracing::warn!(uri = %address, kind = e.kind().as_str(), error = %e, "Resource read failed");
                JsonRpcResponse::error_with_data(
                    id,
                    INTERNAL_ERROR,
                    e.to_string(),
                    Some(json!({ "kind": e.kind().as_str() })),
                )
            }
        }
    }

    fn handle_shutdown(&self, id: Option<Value>) -> JsonRpcResponse {
        tracing::info!("MCP server shutdown requested");
        JsonRpcResponse::success(id, json!(null))
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, McpError> {
    let params = params.ok_or_else(|| McpError::InvalidRequest("Missing params".to_string()))?;
    serde_json::from_value(params)
        .map_err(|e| McpError::InvalidRequest(format!("Invalid params: {e}")))
}

fn to_response<T: serde::Serialize>(id: Option<Value>, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Serialization error: {e}")),
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Request task failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeTransport, test_config};
    use reqwest::StatusCode;

    fn server_with(transport: FakeTransport) -> (McpServer, Arc<FakeTransport>) {
        let transport = Arc::new(transport);
        let api = MetabaseApi::with_transport(&test_config(), transport.clone());
        (McpServer::new(McpConfig::default(), api), transport)
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest::new(1, method, params)
    }

    #[tokio::test]
    async fn test_initialize() {
        let (server, transport) = server_with(FakeTransport::new());

        let response = server.handle_request(request("initialize", None)).await;

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert!(result["capabilities"]["resources"].is_object());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_list_tools() {
        let (server, _) = server_with(FakeTransport::new());

        let response = server.handle_request(request("tools/list", None)).await;

        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 6);
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_list_resource_templates() {
        let (server, _) = server_with(FakeTransport::new());

        let response = server
            .handle_request(request("resources/templates/list", None))
            .await;

        let templates = response.result.unwrap()["resourceTemplates"].clone();
        assert_eq!(templates.as_array().unwrap().len(), 3);
        assert_eq!(templates[0]["uriTemplate"], "metabase://dashboard/{id}");
    }

    #[tokio::test]
    async fn test_call_tool_success() {
        let (server, _) = server_with(
            FakeTransport::new().route("/api/dashboard/5", json!({"id": 5, "cards": [{"id": 1}]})),
        );

        let response = server
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "get_dashboard_cards", "arguments": {"dashboard_id": 5}})),
            ))
            .await;

        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert_eq!(serde_json::from_str::<Value>(text).unwrap(), json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn test_call_tool_upstream_failure_is_error_result() {
        let (server, _) = server_with(FakeTransport::new().fail(
            "/api/card/7/query",
            StatusCode::BAD_REQUEST,
            "Invalid parameter",
        ));

        let response = server
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "execute_card", "arguments": {"card_id": 7}})),
            ))
            .await;

        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("execute card 7"));
        assert!(text.contains("400"));
    }

    #[tokio::test]
    async fn test_call_tool_authentication_failure_is_error_result() {
        let (server, _) = server_with(FakeTransport::new().reject_logins(1));

        let response = server
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "list_databases"})),
            ))
            .await;

        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(
            result["content"][0]["text"]
                .as_str()
                .unwrap()
                .starts_with("failed to authenticate with Metabase")
        );
    }

    #[tokio::test]
    async fn test_call_nonexistent_tool() {
        let (server, _) = server_with(FakeTransport::new());

        let response = server
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "nonexistent", "arguments": {}})),
            ))
            .await;

        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_call_tool_invalid_arguments() {
        let (server, transport) = server_with(FakeTransport::new());

        let response = server
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "execute_card", "arguments": {"card_id": "seven"}})),
            ))
            .await;

        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_read_resource() {
        let (server, _) =
            server_with(FakeTransport::new().route("/api/card/42", json!({"id": 42, "name": "Revenue"})));

        let response = server
            .handle_request(request(
                "resources/read",
                Some(json!({"uri": "metabase://card/42"})),
            ))
            .await;

        let result = response.result.unwrap();
        let contents = &result["contents"][0];
        assert_eq!(contents["uri"], "metabase://card/42");
        assert_eq!(contents["mimeType"], "application/json");
        let body: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
        assert_eq!(body["name"], "Revenue");
    }

    #[tokio::test]
    async fn test_read_resource_failure() {
        let (server, _) = server_with(FakeTransport::new());

        let response = server
            .handle_request(request(
                "resources/read",
                Some(json!({"uri": "metabase://dashboard/99"})),
            ))
            .await;

        let error = response.error.unwrap();
        assert_eq!(error.code, INTERNAL_ERROR);
        assert!(error.message.contains("get dashboard 99"));
        assert_eq!(error.data.unwrap()["kind"], "upstream");
    }

    #[tokio::test]
    async fn test_read_unknown_resource() {
        let (server, _) = server_with(FakeTransport::new());

        let response = server
            .handle_request(request(
                "resources/read",
                Some(json!({"uri": "metabase://collection/1"})),
            ))
            .await;

        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (server, _) = server_with(FakeTransport::new());

        let response = server.handle_request(request("prompts/list", None)).await;

        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_handle_message_notification_and_parse_error() {
        let (server, _) = server_with(FakeTransport::new());

        let notification = server
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(notification.is_none());

        let garbage = server.handle_message("{not json").await.unwrap();
        assert_eq!(garbage.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_concurrent_tool_calls_authenticate_once() {
        let (server, transport) =
            server_with(FakeTransport::new().route("/api/card", json!([{"id": 1}])));

        let calls = (0..5).map(|i| {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .handle_request(JsonRpcRequest::new(
                        i,
                        "tools/call",
                        Some(json!({"name": "list_cards"})),
                    ))
                    .await
            })
        });
        let responses = futures::future::join_all(calls).await;

        for response in responses {
            assert_eq!(response.unwrap().result.unwrap()["isError"], false);
        }
        assert_eq!(transport.count("/api/session"), 1);
        assert_eq!(transport.count("/api/card"), 5);
    }
}
