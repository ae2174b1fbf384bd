//! In-process fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use metabase_core::MetabaseConfig;
use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::client::{MetabaseTransport, TransportError, UpstreamRequest};

pub(crate) fn test_config() -> MetabaseConfig {
    MetabaseConfig::new("http://metabase.test", "analyst", "secret")
}

/// Canned responses keyed by path, recording every request it receives.
pub(crate) struct FakeTransport {
    routes: HashMap<String, Value>,
    failures: HashMap<String, (StatusCode, String)>,
    login_rejections: AtomicUsize,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl FakeTransport {
    pub const TOKEN: &'static str = "test-session-token";

    pub fn new() -> Self {
        let mut routes = HashMap::new();
        routes.insert("/api/session".to_string(), json!({"id": Self::TOKEN}));
        Self {
            routes,
            failures: HashMap::new(),
            login_rejections: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn route(mut self, path: &str, response: Value) -> Self {
        self.routes.insert(path.to_string(), response);
        self
    }

    pub fn fail(mut self, path: &str, status: StatusCode, body: &str) -> Self {
        self.failures
            .insert(path.to_string(), (status, body.to_string()));
        self
    }

    /// Answer the next `n` logins with 401.
    pub fn reject_logins(self, n: usize) -> Self {
        self.login_rejections.store(n, Ordering::SeqCst);
        self
    }

    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    pub fn last_for(&self, path: &str) -> Option<UpstreamRequest> {
        self.requests().into_iter().rev().find(|r| r.path == path)
    }
}

#[async_trait]
impl MetabaseTransport for FakeTransport {
    async fn send(&self, request: UpstreamRequest) -> Result<Value, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        tokio::task::yield_now().await;

        if request.path == "/api/session" {
            let rejected = self
                .login_rejections
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if rejected {
                return Err(TransportError::Status {
                    status: StatusCode::UNAUTHORIZED,
                    body: "{\"errors\":{\"password\":\"did not match stored password\"}}"
                        .to_string(),
                });
            }
        } else if request.session.is_none() {
            return Err(TransportError::Status {
                status: StatusCode::UNAUTHORIZED,
                body: "Unauthenticated".to_string(),
            });
        }

        if let Some((status, body)) = self.failures.get(&request.path) {
            return Err(TransportError::Status {
                status: *status,
                body: body.clone(),
            });
        }

        self.routes
            .get(&request.path)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                status: StatusCode::NOT_FOUND,
                body: "Not found.".to_string(),
            })
    }
}
