//! CLI command implementations for the Metabase MCP server.

pub mod serve;
pub mod tools;
