use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::serve::ServeArgs;
use commands::tools::ToolsArgs;

#[derive(Parser, Debug)]
#[command(
    name = "metabase-mcp",
    version,
    about = "MCP server exposing the Metabase REST API"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server (default when no command is given).
    Serve(ServeArgs),

    /// Print the tool and resource catalog without contacting Metabase.
    Tools(ToolsArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    // stdout carries the stdio transport, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded environment from .env");
    }

    let cli = Cli::parse();

    match cli.cmd.unwrap_or_else(|| Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => commands::serve::run(args).await?,
        Command::Tools(args) => commands::tools::run(&args)?,
    }

    Ok(())
}
