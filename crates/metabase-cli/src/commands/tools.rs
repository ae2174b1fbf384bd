//! `metabase-mcp tools` - print the tool and resource catalog.
//!
//! Works offline; no credentials are needed.

use anyhow::Result;
use clap::Args;
use metabase_mcp::{ResourceTemplate, ToolDefinition, ToolRegistry, resources};

/// Arguments for `metabase-mcp tools`.
#[derive(Debug, Args)]
pub struct ToolsArgs {
    /// Show input schemas.
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn run(args: &ToolsArgs) -> Result<()> {
    let registry = ToolRegistry::builtin();
    print!("{}", render_catalog(&registry.list(), &resources::templates(), args.verbose)?);
    Ok(())
}

fn render_catalog(
    tools: &[&ToolDefinition],
    templates: &[ResourceTemplate],
    verbose: bool,
) -> Result<String> {
    let mut out = String::new();

    out.push_str(&format!("Tools ({}):\n", tools.len()));
    for tool in tools {
        let read_only = tool
            .annotations
            .as_ref()
            .is_some_and(|a| a.read_only_hint == Some(true));
        let badge = if read_only { "read" } else { "query" };
        out.push_str(&format!(
            "  {} [{}]\n      {}\n",
            tool.name,
            badge,
            tool.description.as_deref().unwrap_or("")
        ));
        if verbose {
            let schema = serde_json::to_string_pretty(&tool.input_schema)?;
            for line in schema.lines() {
                out.push_str(&format!("      {line}\n"));
            }
        }
    }

    out.push_str(&format!("\nResource templates ({}):\n", templates.len()));
    for template in templates {
        out.push_str(&format!(
            "  {} ({})\n      {}\n",
            template.uri_template,
            template.name,
            template.description.as_deref().unwrap_or("")
        ));
    }

    Ok(out)
}
