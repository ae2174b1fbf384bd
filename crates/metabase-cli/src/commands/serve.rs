//! `metabase-mcp serve` - run the MCP server.
//!
//! Credentials are checked before anything else is built, so a missing
//! `METABASE_*` variable fails fast without touching the network.

use anyhow::{Context, Result};
use clap::Args;
use metabase_core::{AppConfig, McpConfig, MetabaseConfig, Transport};
use metabase_mcp::{McpServer, MetabaseApi};
use std::path::PathBuf;
use tracing::info;

/// Default location of the optional configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "metabase-mcp.yaml";

/// Arguments for `metabase-mcp serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Configuration file path. Ignored when missing.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Transport type: stdio or http.
    #[arg(long, env = "METABASE_MCP_TRANSPORT")]
    pub transport: Option<Transport>,

    /// HTTP host to bind (http transport only).
    #[arg(long, env = "METABASE_MCP_HOST")]
    pub host: Option<String>,

    /// HTTP port to bind (http transport only).
    #[arg(short, long, env = "METABASE_MCP_PORT")]
    pub port: Option<u16>,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            config: PathBuf::from(DEFAULT_CONFIG_FILE),
            transport: None,
            host: None,
            port: None,
        }
    }
}

/// Run the MCP server.
pub async fn run(args: ServeArgs) -> Result<()> {
    let server = build_server(&args, |name| std::env::var(name).ok())?;

    server.run().await.context("MCP server error")?;

    info!("MCP server stopped");
    Ok(())
}

/// Load credentials, then configuration, then build the server.
///
/// Credentials come first so a missing variable stops startup before the
/// config file is read or any tool is registered.
fn build_server<F>(args: &ServeArgs, lookup: F) -> Result<McpServer>
where
    F: Fn(&str) -> Option<String>,
{
    let credentials =
        MetabaseConfig::from_lookup(lookup).context("Metabase credentials are not configured")?;

    let mcp = resolve_mcp_config(args)?;

    info!(
        metabase_url = %credentials.url,
        transport = %mcp.transport,
        "Starting Metabase MCP server"
    );
    if mcp.is_http() {
        info!(addr = %mcp.bind_addr(), "HTTP transport selected");
    }

    let api = MetabaseApi::new(&credentials).context("Failed to create Metabase client")?;
    Ok(McpServer::new(mcp, api))
}

/// Merge the optional config file with command-line overrides.
fn resolve_mcp_config(args: &ServeArgs) -> Result<McpConfig> {
    let file = AppConfig::load_optional(&args.config)
        .with_context(|| format!("Failed to load configuration from {:?}", args.config))?;

    let mut mcp = file.mcp;
    if let Some(transport) = args.transport {
        mcp.transport = transport;
    }
    if let Some(host) = &args.host {
        mcp.host = host.clone();
    }
    if let Some(port) = args.port {
        mcp.port = port;
    }
    Ok(mcp)
}
