//! # metabase-mcp
//!
//! MCP (Model Context Protocol) server exposing the Metabase REST API.
//!
//! The server authenticates once against Metabase, caches the session token,
//! and forwards each tool call or resource read as a single upstream request:
//!
//! - **Lazy Session**: the first operation logs in; later ones reuse the token
//! - **Uniform Errors**: every failure names the operation and its target
//! - **Multiple Transports**: stdio and HTTP
//!
//! ## Architecture
//!
//! ```text
//! AI Assistant
//!       │
//!       │ MCP protocol (tools/call, resources/read)
//!       ▼
//! ┌──────────────────────┐
//! │  Metabase MCP Server │
//! │  1. Dispatch         │  ← tools / resources tables
//! │  2. Ensure session   │  ← POST /api/session (once)
//! │  3. One request      │  ← X-Metabase-Session header
//! │  4. Pretty JSON      │
//! └──────────┬───────────┘
//!            │
//!            ▼
//!      Metabase REST API
//! ```
//!
//! ## Tools and Resources
//!
//! | Name | Kind | Upstream call |
//! |------|------|---------------|
//! | `list_dashboards` | tool | `GET /api/dashboard` |
//! | `list_cards` | tool | `GET /api/card` |
//! | `list_databases` | tool | `GET /api/database` |
//! | `execute_card` | tool | `POST /api/card/{card_id}/query` |
//! | `get_dashboard_cards` | tool | `GET /api/dashboard/{dashboard_id}` |
//! | `execute_query` | tool | `POST /api/dataset` |
//! | `metabase://dashboard/{id}` | resource | `GET /api/dashboard/{id}` |
//! | `metabase://card/{id}` | resource | `GET /api/card/{id}` |
//! | `metabase://database/{id}` | resource | `GET /api/database/{id}` |
//!
//! ## Example Usage
//!
//! ```ignore
//! use metabase_core::{McpConfig, MetabaseConfig};
//! use metabase_mcp::{MetabaseApi, McpServer};
//!
//! let credentials = MetabaseConfig::from_env()?;
//! let api = MetabaseApi::new(&credentials)?;
//!
//! McpServer::new(McpConfig::default(), api).run().await?;
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod http_transport;
pub mod operation;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod session;
pub mod tools;

#[cfg(test)]
mod test_support;

// Re-export main types
pub use api::MetabaseApi;
pub use client::{HttpClient, MetabaseTransport, TransportError, UpstreamRequest};
pub use error::{ErrorKind, McpError, MetabaseError};
pub use operation::Operation;
pub use protocol::{
    CallToolParams, CallToolResponse, JsonRpcRequest, JsonRpcResponse, ResourceTemplate,
    ToolAnnotations, ToolContent, ToolDefinition,
};
pub use resources::{ResourceAddress, ResourceKind};
pub use server::McpServer;
pub use session::{SessionManager, SessionToken};
pub use tools::ToolRegistry;
