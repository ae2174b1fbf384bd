//! Upstream HTTP transport.
//!
//! Every call to Metabase goes through [`MetabaseTransport`]. The production
//! implementation is [`HttpClient`], backed by `reqwest`; tests substitute
//! in-process fakes.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::session::SessionToken;

/// Header carrying the session token on authenticated requests.
pub const SESSION_HEADER: &str = "X-Metabase-Session";

/// Upstream error bodies longer than this are truncated in error messages.
const MAX_ERROR_BODY: usize = 512;

/// HTTP method of an upstream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A single request to the Metabase REST API.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: HttpMethod,
    /// Path relative to the base URL, e.g. `/api/card/7/query`.
    pub path: String,
    pub body: Option<Value>,
    pub session: Option<SessionToken>,
}

impl UpstreamRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
            session: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(body),
            session: None,
        }
    }

    /// Attach the session token sent as [`SESSION_HEADER`].
    pub fn with_session(mut self, token: SessionToken) -> Self {
        self.session = Some(token);
        self
    }
}

/// Low-level failure of one upstream round trip.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Metabase answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body was not valid JSON.
    #[error("invalid JSON response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The response was valid JSON but lacked a required field.
    #[error("response is missing field '{0}'")]
    MissingField(&'static str),
}

/// Sends requests to Metabase and decodes JSON responses.
#[async_trait]
pub trait MetabaseTransport: Send + Sync {
    /// Perform exactly one round trip. Non-2xx statuses are errors.
    async fn send(&self, request: UpstreamRequest) -> Result<Value, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a client for the given base URL.
    ///
    /// Connection pooling, TLS and timeouts use `reqwest` defaults.
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl MetabaseTransport for HttpClient {
    async fn send(&self, request: UpstreamRequest) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };
        if let Some(token) = &request.session {
            builder = builder.header(SESSION_HEADER, token.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = ?request.method, path = %request.path, "Sending Metabase request");

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status,
                body: truncate_body(&String::from_utf8_lossy(&bytes)),
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
