//! Operation handlers.
//!
//! Each method ensures a session, performs one upstream request and returns
//! the response as pretty-printed JSON text. Nothing is retried or cached.

use std::sync::Arc;

use metabase_core::{ConfigError, MetabaseConfig};
use serde_json::{Map, Value, json};

use crate::client::{HttpClient, MetabaseTransport, UpstreamRequest};
use crate::error::MetabaseError;
use crate::operation::Operation;
use crate::session::SessionManager;

/// Metabase REST API surface used by the tools and resources.
pub struct MetabaseApi {
    transport: Arc<dyn MetabaseTransport>,
    session: SessionManager,
}

impl MetabaseApi {
    /// Create an API backed by a `reqwest` client for `config.url`.
    pub fn new(config: &MetabaseConfig) -> Result<Self, MetabaseError> {
        let client = HttpClient::new(&config.url).map_err(|e| {
            ConfigError::Invalid(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self::with_transport(config, Arc::new(client)))
    }

    /// Create an API over an arbitrary transport.
    pub fn with_transport(config: &MetabaseConfig, transport: Arc<dyn MetabaseTransport>) -> Self {
        Self {
            session: SessionManager::new(config, transport.clone()),
            transport,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// List all dashboards.
    pub async fn list_dashboards(&self) -> Result<String, MetabaseError> {
        let value = self
            .call(Operation::ListDashboards, None, UpstreamRequest::get("/api/dashboard"))
            .await?;
        Ok(pretty(&value))
    }

    /// List all questions/cards.
    pub async fn list_cards(&self) -> Result<String, MetabaseError> {
        let value = self
            .call(Operation::ListCards, None, UpstreamRequest::get("/api/card"))
            .await?;
        Ok(pretty(&value))
    }

    /// List all databases.
    pub async fn list_databases(&self) -> Result<String, MetabaseError> {
        let value = self
            .call(Operation::ListDatabases, None, UpstreamRequest::get("/api/database"))
            .await?;
        Ok(pretty(&value))
    }

    /// Run a saved question. Absent parameters are sent as `{}`.
    pub async fn execute_card(
        &self,
        card_id: i64,
        parameters: Option<Map<String, Value>>,
    ) -> Result<String, MetabaseError> {
        let body = json!({ "parameters": parameters.unwrap_or_default() });
        let value = self
            .call(
                Operation::ExecuteCard,
                Some(card_id.to_string()),
                UpstreamRequest::post(format!("/api/card/{card_id}/query"), body),
            )
            .await?;
        Ok(pretty(&value))
    }

    /// Return only the `cards` of a dashboard (`[]` when the field is absent).
    pub async fn get_dashboard_cards(&self, dashboard_id: i64) -> Result<String, MetabaseError> {
        let mut value = self
            .call(
                Operation::GetDashboardCards,
                Some(dashboard_id.to_string()),
                UpstreamRequest::get(format!("/api/dashboard/{dashboard_id}")),
            )
            .await?;
        let cards = value
            .get_mut("cards")
            .map(Value::take)
            .unwrap_or_else(|| Value::Array(Vec::new()));
        Ok(pretty(&cards))
    }

    /// Run a native (SQL) query against a database. The SQL is passed through
    /// untouched; absent parameters are sent as `[]`.
    pub async fn execute_query(
        &self,
        database_id: i64,
        query: &str,
        native_parameters: Option<Vec<Value>>,
    ) -> Result<String, MetabaseError> {
        let body = native_query_body(database_id, query, native_parameters);
        let value = self
            .call(
                Operation::ExecuteQuery,
                Some(database_id.to_string()),
                UpstreamRequest::post("/api/dataset", body),
            )
            .await?;
        Ok(pretty(&value))
    }

    /// Fetch a dashboard document by id.
    pub async fn get_dashboard(&self, id: &str) -> Result<String, MetabaseError> {
        self.fetch(Operation::GetDashboard, "dashboard", id).await
    }

    /// Fetch a card document by id.
    pub async fn get_card(&self, id: &str) -> Result<String, MetabaseError> {
        self.fetch(Operation::GetCard, "card", id).await
    }

    /// Fetch a database document by id.
    pub async fn get_database(&self, id: &str) -> Result<String, MetabaseError> {
        self.fetch(Operation::GetDatabase, "database", id).await
    }

    /// The id is percent-encoded so it always stays a single path segment.
    async fn fetch(
        &self,
        operation: Operation,
        collection: &str,
        id: &str,
    ) -> Result<String, MetabaseError> {
        let value = self
            .call(
                operation,
                Some(id.to_string()),
                UpstreamRequest::get(format!(
                    "/api/{collection}/{}",
                    urlencoding::encode(id)
                )),
            )
            .await?;
        Ok(pretty(&value))
    }

    async fn call(
        &self,
        operation: Operation,
        target: Option<String>,
        request: UpstreamRequest,
    ) -> Result<Value, MetabaseError> {
        let token = self.session.ensure().await?;

        tracing::debug!(operation = %operation, target = ?target, "Calling Metabase");

        match self.transport.send(request.with_session(token)).await {
            Ok(value) => Ok(value),
            Err(source) => {
                let err = MetabaseError::Upstream {
                    operation,
                    target,
                    source,
                };
                tracing::error!(operation = %operation, error = %err, "Metabase request failed");
                Err(err)
            }
        }
    }
}

/// Request envelope for `POST /api/dataset`.
pub fn native_query_body(
    database_id: i64,
    query: &str,
    native_parameters: Option<Vec<Value>>,
) -> Value {
    json!({
        "type": "native",
        "native": {
            "query": query,
            "template_tags": {},
        },
        "parameters": native_parameters.unwrap_or_default(),
        "database": database_id,
    })
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
