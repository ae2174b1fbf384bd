//! Tool registry for MCP tools.
//!
//! The six Metabase tools are declared once in a static table. Each entry
//! pairs a [`ToolDefinition`] with a handler sharing one contract: decode
//! the JSON arguments, run the operation, return pretty-printed JSON.

use std::collections::HashMap;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::api::MetabaseApi;
use crate::error::McpError;
use crate::protocol::{ToolAnnotations, ToolDefinition};

pub type ToolFuture<'a> = BoxFuture<'a, Result<String, McpError>>;

/// Handler signature shared by every tool.
pub type ToolHandler = for<'a> fn(&'a MetabaseApi, Value) -> ToolFuture<'a>;

struct ToolSpec {
    name: &'static str,
    description: &'static str,
    read_only: bool,
    input_schema: fn() -> Value,
    handler: ToolHandler,
}

const BUILTIN_TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "list_dashboards",
        description: "List all dashboards in Metabase",
        read_only: true,
        input_schema: no_arguments_schema,
        handler: list_dashboards,
    },
    ToolSpec {
        name: "list_cards",
        description: "List all questions/cards in Metabase",
        read_only: true,
        input_schema: no_arguments_schema,
        handler: list_cards,
    },
    ToolSpec {
        name: "list_databases",
        description: "List all databases in Metabase",
        read_only: true,
        input_schema: no_arguments_schema,
        handler: list_databases,
    },
    ToolSpec {
        name: "execute_card",
        description: "Execute a Metabase question/card and get results",
        read_only: false,
        input_schema: execute_card_schema,
        handler: execute_card,
    },
    ToolSpec {
        name: "get_dashboard_cards",
        description: "Get all cards in a dashboard",
        read_only: true,
        input_schema: dashboard_cards_schema,
        handler: get_dashboard_cards,
    },
    ToolSpec {
        name: "execute_query",
        description: "Execute a SQL query against a Metabase database",
        read_only: false,
        input_schema: execute_query_schema,
        handler: execute_query,
    },
];

/// Arguments of `execute_card`.
#[derive(Debug, Deserialize)]
pub struct ExecuteCardArgs {
    pub card_id: i64,
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
}

/// Arguments of `get_dashboard_cards`.
#[derive(Debug, Deserialize)]
pub struct DashboardCardsArgs {
    pub dashboard_id: i64,
}

/// Arguments of `execute_query`.
#[derive(Debug, Deserialize)]
pub struct ExecuteQueryArgs {
    pub database_id: i64,
    pub query: String,
    #[serde(default)]
    pub native_parameters: Option<Vec<Value>>,
}

/// A tool definition bound to its handler.
#[derive(Clone)]
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    handler: ToolHandler,
}

impl RegisteredTool {
    pub fn new(definition: ToolDefinition, handler: ToolHandler) -> Self {
        Self {
            definition,
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Invoke the handler.
    pub async fn call(&self, api: &MetabaseApi, arguments: Value) -> Result<String, McpError> {
        (self.handler)(api, arguments).await
    }
}

/// Registry of available MCP tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in Metabase tools.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for spec in BUILTIN_TOOLS {
            registry.register(RegisteredTool::new(
                ToolDefinition {
                    name: spec.name.to_string(),
                    description: Some(spec.description.to_string()),
                    input_schema: (spec.input_schema)(),
                    annotations: Some(ToolAnnotations {
                        read_only_hint: Some(spec.read_only),
                        open_world_hint: Some(true),
                    }),
                },
                spec.handler,
            ));
        }
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: RegisteredTool) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// List all tool definitions, sorted by name.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        let mut definitions: Vec<_> = self.tools.values().map(|t| &t.definition).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Decode tool arguments. A missing arguments object counts as `{}`.
fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, McpError> {
    let arguments = if arguments.is_null() {
        Value::Object(Map::new())
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| McpError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

fn list_dashboards(api: &MetabaseApi, _arguments: Value) -> ToolFuture<'_> {
    async move { Ok::<_, McpError>(api.list_dashboards().await?) }.boxed()
}

fn list_cards(api: &MetabaseApi, _arguments: Value) -> ToolFuture<'_> {
    async move { Ok::<_, McpError>(api.list_cards().await?) }.boxed()
}

fn list_databases(api: &MetabaseApi, _arguments: Value) -> ToolFuture<'_> {
    async move { Ok::<_, McpError>(api.list_databases().await?) }.boxed()
}

fn execute_card(api: &MetabaseApi, arguments: Value) -> ToolFuture<'_> {
    async move {
        let args: ExecuteCardArgs = parse_args("execute_card", arguments)?;
        Ok::<_, McpError>(api.execute_card(args.card_id, args.parameters).await?)
    }
    .boxed()
}

fn get_dashboard_cards(api: &MetabaseApi, arguments: Value) -> ToolFuture<'_> {
    async move {
        let args: DashboardCardsArgs = parse_args("get_dashboard_cards", arguments)?;
        Ok::<_, McpError>(api.get_dashboard_cards(args.dashboard_id).await?)
    }
    .boxed()
}

fn execute_query(api: &MetabaseApi, arguments: Value) -> ToolFuture<'_> {
    async move {
        let args: ExecuteQueryArgs = parse_args("execute_query", arguments)?;
        Ok::<_, McpError>(
            api.execute_query(args.database_id, &args.query, args.native_parameters)
                .await?,
        )
    }
    .boxed()
}

fn no_arguments_schema() -> Value {
    json!({
        "type": "object",
        "properties": {}
    })
}

fn execute_card_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "card_id": {
                "type": "integer",
                "description": "ID of the card/question to execute"
            },
            "parameters": {
                "type": "object",
                "description": "Optional parameters for the query"
            }
        },
        "required": ["card_id"]
    })
}

fn dashboard_cards_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "dashboard_id": {
                "type": "integer",
                "description": "ID of the dashboard"
            }
        },
        "required": ["dashboard_id"]
    })
}

fn execute_query_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "database_id": {
                "type": "integer",
                "description": "ID of the database to query"
            },
            "query": {
                "type": "string",
                "description": "SQL query to execute"
            },
            "native_parameters": {
                "type": "array",
                "items": {"type": "object"},
                "description": "Optional parameters for the query"
            }
        },
        "required": ["database_id", "query"]
    })
}
