//! Configuration types shared across the Metabase MCP crates.

pub mod config;

pub use config::{AppConfig, ConfigError, McpConfig, MetabaseConfig, Transport};
