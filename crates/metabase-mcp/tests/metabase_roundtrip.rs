//! End-to-end tests: MCP requests dispatched against a mocked Metabase.

use metabase_core::{McpConfig, MetabaseConfig};
use metabase_mcp::client::SESSION_HEADER;
use metabase_mcp::{JsonRpcRequest, McpServer, MetabaseApi};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "0b9c8f6e-session";

async fn mount_login(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/session"))
        .and(body_json(json!({"username": "analyst@example.com", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": TOKEN})))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn mcp_server(upstream: &MockServer) -> McpServer {
    let credentials = MetabaseConfig::new(upstream.uri(), "analyst@example.com", "hunter2");
    let api = MetabaseApi::new(&credentials).unwrap();
    McpServer::new(McpConfig::default(), api)
}

async fn call_tool(server: &McpServer, name: &str, arguments: Value) -> Value {
    let response = server
        .handle_request(JsonRpcRequest::new(
            1,
            "tools/call",
            Some(json!({"name": name, "arguments": arguments})),
        ))
        .await;
    assert!(response.error.is_none(), "unexpected error: {:?}", response.error);
    response.result.unwrap()
}

fn text_of(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap()
}

#[tokio::test]
async fn test_session_is_acquired_once_and_reused() {
    let upstream = MockServer::start().await;
    mount_login(&upstream, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard"))
        .and(header(SESSION_HEADER, TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "Sales"}])))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/card"))
        .and(header(SESSION_HEADER, TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = mcp_server(&upstream);

    let dashboards = call_tool(&server, "list_dashboards", json!({})).await;
    assert_eq!(dashboards["isError"], false);
    assert_eq!(
        text_of(&dashboards),
        "[\n  {\n    \"id\": 1,\n    \"name\": \"Sales\"\n  }\n]"
    );

    let cards = call_tool(&server, "list_cards", json!({})).await;
    assert_eq!(text_of(&cards), "[]");
    assert!(server.api().session().is_authenticated().await);
}

#[tokio::test]
async fn test_rejected_login_is_retried_on_next_call() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/session"))
        .respond_with(ResponseTemplate::new(401).set_body_string("did not match stored password"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&upstream)
        .await;
    mount_login(&upstream, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/database"))
        .and(header(SESSION_HEADER, TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&upstream)
        .await;

    let server = mcp_server(&upstream);

    let first = call_tool(&server, "list_databases", json!({})).await;
    assert_eq!(first["isError"], true);
    assert!(text_of(&first).contains("authenticate"));
    assert!(!server.api().session().is_authenticated().await);

    let second = call_tool(&server, "list_databases", json!({})).await;
    assert_eq!(second["isError"], false);
}

#[tokio::test]
async fn test_execute_query_posts_native_dataset() {
    let upstream = MockServer::start().await;
    mount_login(&upstream, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/dataset"))
        .and(header(SESSION_HEADER, TOKEN))
        .and(body_json(json!({
            "type": "native",
            "native": {"query": "SELECT 1", "template_tags": {}},
            "parameters": [],
            "database": 3
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"data": {"rows": [[1]]}})))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = mcp_server(&upstream);
    let result = call_tool(
        &server,
        "execute_query",
        json!({"database_id": 3, "query": "SELECT 1"}),
    )
    .await;

    assert_eq!(result["isError"], false);
    let body: Value = serde_json::from_str(text_of(&result)).unwrap();
    assert_eq!(body["data"]["rows"], json!([[1]]));
}

#[tokio::test]
async fn test_execute_card_failure_names_card_and_status() {
    let upstream = MockServer::start().await;
    mount_login(&upstream, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/card/7/query"))
        .and(body_json(json!({"parameters": {}})))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found."))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = mcp_server(&upstream);
    let result = call_tool(&server, "execute_card", json!({"card_id": 7})).await;

    assert_eq!(result["isError"], true);
    let message = text_of(&result);
    assert!(message.contains("card 7"), "{message}");
    assert!(message.contains("404"), "{message}");
    assert!(server.api().session().is_authenticated().await);
}

#[tokio::test]
async fn test_read_database_resource() {
    let upstream = MockServer::start().await;
    mount_login(&upstream, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/database/2"))
        .and(header(SESSION_HEADER, TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 2, "engine": "postgres"})))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = mcp_server(&upstream);
    let response = server
        .handle_request(JsonRpcRequest::new(
            "read-1",
            "resources/read",
            Some(json!({"uri": "metabase://database/2"})),
        ))
        .await;

    assert_eq!(response.id, Some(json!("read-1")));
    let contents = &response.result.unwrap()["contents"][0];
    assert_eq!(contents["uri"], "metabase://database/2");
    let body: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    assert_eq!(body["engine"], "postgres");
}
