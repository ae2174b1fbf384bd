//! HTTP transport for the MCP server.
//!
//! JSON-RPC messages are posted to `/mcp`; each request is handled on its own
//! axum task against the shared [`McpServer`].

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::error::McpError;
use crate::server::McpServer;

/// Create the HTTP router for MCP.
pub fn create_router(server: McpServer) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp_post))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

/// Handle POST requests to /mcp (JSON-RPC over HTTP).
///
/// The body is taken raw so malformed JSON is answered with a JSON-RPC parse
/// error instead of an extractor rejection.
async fn handle_mcp_post(State(server): State<McpServer>, body: String) -> Response {
    match server.handle_message(&body).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Handle health check requests.
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "metabase-mcp",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// HTTP server for MCP transport.
pub struct HttpServer {
    addr: String,
    server: McpServer,
}

impl HttpServer {
    /// Create a new HTTP server bound to `addr` once run.
    pub fn new(addr: impl Into<String>, server: McpServer) -> Self {
        Self {
            addr: addr.into(),
            server,
        }
    }

    /// Run the HTTP server until it fails.
    pub async fn run(self) -> Result<(), McpError> {
        let router = create_router(self.server);

        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| McpError::StartupFailed(format!("failed to bind {}: {e}", self.addr)))?;

        tracing::info!(addr = %self.addr, "MCP HTTP server listening");

        axum::serve(listener, router)
            .await
            .map_err(|e| McpError::StartupFailed(e.to_string()))
    }
}
