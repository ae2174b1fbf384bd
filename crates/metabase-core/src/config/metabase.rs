//! Upstream Metabase credentials.
//!
//! The base URL, username and password are read once from the environment
//! at startup. All three are required; the process must not open its RPC
//! boundary without them.

use std::env;
use std::fmt;

use super::ConfigError;

/// Environment variable holding the Metabase base URL.
pub const METABASE_URL_ENV: &str = "METABASE_URL";
/// Environment variable holding the Metabase username.
pub const METABASE_USERNAME_ENV: &str = "METABASE_USERNAME";
/// Environment variable holding the Metabase password.
pub const METABASE_PASSWORD_ENV: &str = "METABASE_PASSWORD";

/// Credentials for the upstream Metabase instance.
#[derive(Clone, PartialEq, Eq)]
pub struct MetabaseConfig {
    /// Base URL of the Metabase instance, without a trailing slash.
    pub url: String,
    /// Username used for `POST /api/session`.
    pub username: String,
    /// Password used for `POST /api/session`.
    pub password: String,
}

impl MetabaseConfig {
    /// Build credentials directly, normalizing the base URL.
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: normalize_url(url.into()),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Load credentials from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load credentials through an arbitrary variable lookup.
    ///
    /// Blank values are treated the same as missing ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingEnv { name })
        };

        // Only the URL is trimmed; credentials are sent exactly as given.
        let url = require(METABASE_URL_ENV)?.trim().to_string();
        let username = require(METABASE_USERNAME_ENV)?;
        let password = require(METABASE_PASSWORD_ENV)?;

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "{METABASE_URL_ENV} must be an http(s) URL, got '{url}'"
            )));
        }

        Ok(Self::new(url, username, password))
    }
}

impl fmt::Debug for MetabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetabaseConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn normalize_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
