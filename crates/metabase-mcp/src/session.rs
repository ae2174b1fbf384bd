//! Session credential lifecycle.
//!
//! The [`SessionManager`] logs in lazily on first use and caches the
//! returned token for the lifetime of the process. The check-then-login
//! sequence runs under a lock, so concurrent first calls produce a single
//! `POST /api/session`.

use std::fmt;
use std::sync::Arc;

use metabase_core::MetabaseConfig;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::client::{MetabaseTransport, TransportError, UpstreamRequest};
use crate::error::MetabaseError;

/// Opaque session id issued by `POST /api/session`.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Owns the cached session token.
pub struct SessionManager {
    transport: Arc<dyn MetabaseTransport>,
    username: String,
    password: String,
    token: Mutex<Option<SessionToken>>,
}

impl SessionManager {
    pub fn new(config: &MetabaseConfig, transport: Arc<dyn MetabaseTransport>) -> Self {
        Self {
            transport,
            username: config.username.clone(),
            password: config.password.clone(),
            token: Mutex::new(None),
        }
    }

    /// Return the cached token, logging in first if there is none.
    ///
    /// A failed login leaves the cache empty so the next call starts over.
    pub async fn ensure(&self) -> Result<SessionToken, MetabaseError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        tracing::info!(username = %self.username, "Authenticating with Metabase");

        match self.authenticate().await {
            Ok(token) => {
                *cached = Some(token.clone());
                tracing::info!("Successfully authenticated with Metabase");
                Ok(token)
            }
            Err(source) => {
                tracing::error!(error = %source, "Authentication failed");
                Err(MetabaseError::Authentication { source })
            }
        }
    }

    /// Drop the cached token. The next [`ensure`](Self::ensure) logs in again.
    pub async fn invalidate(&self) -> Option<SessionToken> {
        self.token.lock().await.take()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.lock().await.is_some()
    }

    async fn authenticate(&self) -> Result<SessionToken, TransportError> {
        let request = UpstreamRequest::post(
            "/api/session",
            json!({
                "username": self.username,
                "password": self.password,
            }),
        );

        let response = self.transport.send(request).await?;
        response
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(SessionToken::new)
            .ok_or(TransportError::MissingField("id"))
    }
}
