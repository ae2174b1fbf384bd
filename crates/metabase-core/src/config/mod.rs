//! Configuration types for the Metabase MCP server.
//!
//! Upstream credentials always come from the environment (see
//! [`MetabaseConfig::from_env`]). Transport settings may additionally be
//! read from an optional YAML file:
//!
//! ```yaml
//! mcp:
//!   transport: http
//!   host: 0.0.0.0
//!   port: 3000
//! ```

pub mod mcp;
pub mod metabase;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use mcp::{McpConfig, Transport};
pub use metabase::{
    METABASE_PASSWORD_ENV, METABASE_URL_ENV, METABASE_USERNAME_ENV, MetabaseConfig,
};

/// Settings loaded from the optional configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// MCP server configuration.
    #[serde(default)]
    pub mcp: McpConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("missing required environment variable {name}")]
    MissingEnv { name: &'static str },

    #[error("Configuration error: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}
